use axum::extract::{Extension, State};

use crate::database::models::{Tenant, TenantDashboard, TenantOverview, TenantPatch, TenantSettings, TenantSettingsUpdate};
use crate::handlers::extract::ApiJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/tenant - Tenant, owning company and row counts
pub async fn get(State(state): State<AppState>, Extension(tenant): Extension<TenantContext>) -> ApiResult<TenantOverview> {
    Ok(ApiResponse::success(state.services.tenant.overview(tenant.tenant_id).await?))
}

pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(patch): ApiJson<TenantPatch>,
) -> ApiResult<Tenant> {
    let updated = state.services.tenant.update(tenant.tenant_id, &patch).await?;
    Ok(ApiResponse::success(updated).with_message("Tenant updated successfully"))
}

/// GET /api/crm/tenant/settings
pub async fn settings(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<TenantSettings> {
    Ok(ApiResponse::success(state.services.tenant.settings(tenant.tenant_id).await?))
}

/// PUT /api/crm/tenant/settings - `{ settings: { ... } }`
pub async fn put_settings(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<TenantSettingsUpdate>,
) -> ApiResult<Tenant> {
    let updated = state.services.tenant.update_settings(tenant.tenant_id, &body).await?;
    Ok(ApiResponse::success(updated).with_message("Tenant settings updated successfully"))
}

/// GET /api/crm/tenant/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<TenantDashboard> {
    Ok(ApiResponse::success(state.services.tenant.dashboard(tenant.tenant_id).await?))
}
