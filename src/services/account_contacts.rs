use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{OrNotFound, ServiceError, ServiceResult, NO_FIELDS};
use crate::database::models::account_contact::NOT_FOUND;
use crate::database::models::{
    AccountContact, AccountContactFilters, AccountContactPatch, AccountContactView, NewAccountContact,
};
use crate::repository::{AccountContactRepository, Repositories};

/// Links between accounts and contacts
#[derive(Clone)]
pub struct AccountContactService {
    links: Arc<dyn AccountContactRepository>,
}

impl AccountContactService {
    pub fn new(repos: &Repositories) -> Self {
        Self { links: repos.account_contacts.clone() }
    }

    pub async fn create(&self, tenant_id: i32, input: NewAccountContact) -> ServiceResult<AccountContact> {
        let link = input
            .into_link(tenant_id)
            .ok_or_else(|| ServiceError::validation("Account ID and Contact ID are required"))?;

        let created = self
            .links
            .create(link)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Account contact link rejected"))?;
        info!(tenant_id, link_id = %created.id, "Linked contact to account");
        Ok(created)
    }

    pub async fn list(&self, tenant_id: i32, filters: &AccountContactFilters) -> ServiceResult<Vec<AccountContactView>> {
        Ok(self.links.list(tenant_id, filters).await?)
    }

    pub async fn update(&self, tenant_id: i32, id: Uuid, patch: &AccountContactPatch) -> ServiceResult<AccountContact> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.links.update(tenant_id, id, &patch).await?.or_not_found(NOT_FOUND)
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid) -> ServiceResult<()> {
        if !self.links.delete(tenant_id, id).await? {
            return Err(ServiceError::not_found(NOT_FOUND));
        }
        Ok(())
    }
}
