use std::sync::Arc;

use tracing::info;

use super::{OrNotFound, ServiceError, ServiceResult, NO_FIELDS};
use crate::database::models::tenant::NOT_FOUND;
use crate::database::models::{
    Tenant, TenantDashboard, TenantOverview, TenantPatch, TenantSettings, TenantSettingsUpdate,
};
use crate::repository::{Repositories, TenantRepository};

#[derive(Clone)]
pub struct TenantService {
    tenants: Arc<dyn TenantRepository>,
}

impl TenantService {
    pub fn new(repos: &Repositories) -> Self {
        Self { tenants: repos.tenants.clone() }
    }

    pub async fn overview(&self, tenant_id: i32) -> ServiceResult<TenantOverview> {
        self.tenants.overview(tenant_id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn update(&self, tenant_id: i32, patch: &TenantPatch) -> ServiceResult<Tenant> {
        self.apply(tenant_id, patch, NO_FIELDS).await
    }

    pub async fn settings(&self, tenant_id: i32) -> ServiceResult<TenantSettings> {
        self.tenants.settings(tenant_id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn update_settings(&self, tenant_id: i32, body: &TenantSettingsUpdate) -> ServiceResult<Tenant> {
        self.apply(tenant_id, &body.settings, "No valid settings to update").await
    }

    pub async fn dashboard(&self, tenant_id: i32) -> ServiceResult<TenantDashboard> {
        Ok(self.tenants.dashboard(tenant_id).await?)
    }

    async fn apply(&self, tenant_id: i32, patch: &TenantPatch, empty: &'static str) -> ServiceResult<Tenant> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(ServiceError::validation(empty));
        }
        let tenant = self.tenants.update(tenant_id, &patch).await?.or_not_found(NOT_FOUND)?;
        info!(tenant_id, name = %tenant.name, active = tenant.is_active, "Updated tenant");
        Ok(tenant)
    }
}
