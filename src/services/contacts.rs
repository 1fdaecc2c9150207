use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{search_params, Listed, OrNotFound, Searched, ServiceError, ServiceResult, FORCE_DELETE_HINT, NO_FIELDS};
use crate::config::PaginationConfig;
use crate::database::models::contact::NOT_FOUND;
use crate::database::models::{
    AccountContactFilters, AccountContactView, Contact, ContactFilters, ContactPatch, ContactRelations,
    ContactSearchFilters, ContactStats, ContactSummary, NewContact, OpportunityContactFilters, OpportunityContactView,
    SearchRequest,
};
use crate::database::PageParams;
use crate::repository::{
    AccountContactRepository, ContactRepository, DeleteOutcome, OpportunityContactRepository, Repositories,
};

#[derive(Clone)]
pub struct ContactService {
    contacts: Arc<dyn ContactRepository>,
    account_links: Arc<dyn AccountContactRepository>,
    opportunity_links: Arc<dyn OpportunityContactRepository>,
    pagination: PaginationConfig,
}

impl ContactService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            contacts: repos.contacts.clone(),
            account_links: repos.account_contacts.clone(),
            opportunity_links: repos.opportunity_contacts.clone(),
            pagination,
        }
    }

    pub async fn list(
        &self,
        tenant_id: i32,
        filters: &ContactFilters,
        page: &PageParams,
    ) -> ServiceResult<Listed<ContactSummary>> {
        let page = page.to_request(self.pagination.default_limit)?;
        let found = self.contacts.list(tenant_id, filters, &page).await?;
        Ok(Listed { pagination: page.pagination(found.total), rows: found.rows })
    }

    pub async fn search(
        &self,
        tenant_id: i32,
        request: &SearchRequest<ContactSearchFilters>,
    ) -> ServiceResult<Searched<Contact>> {
        let (term, window) = search_params(request, &self.pagination)?;
        let found = self.contacts.search(tenant_id, &term, &request.filters, &window).await?;
        Ok(Searched { pagination: window.pagination(found.total), rows: found.rows })
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Contact> {
        self.contacts.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn create(&self, tenant_id: i32, actor: Option<i32>, input: NewContact) -> ServiceResult<Contact> {
        let contact = input
            .into_contact(tenant_id, actor)
            .ok_or_else(|| ServiceError::validation("First name and last name are required"))?;

        let created = self
            .contacts
            .create(contact)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Contact create rejected"))?;
        info!(tenant_id, contact_id = %created.id, "Created contact");
        Ok(created)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        actor: Option<i32>,
        patch: &ContactPatch,
    ) -> ServiceResult<Contact> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.contacts
            .update(tenant_id, id, &patch, actor)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, contact_id = %id, error = %e, "Contact update rejected"))
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> ServiceResult<String> {
        match self.contacts.delete(tenant_id, id, force).await? {
            DeleteOutcome::Missing => Err(ServiceError::not_found(NOT_FOUND)),
            DeleteOutcome::Blocked(counts) => {
                warn!(tenant_id, contact_id = %id, ?counts, "Contact delete blocked by related data");
                Err(ServiceError::HasDependents {
                    message: "Cannot delete contact with related data".to_string(),
                    data: json!({
                        "account_count": counts.account_count,
                        "opportunity_count": counts.opportunity_count,
                        "suggestion": FORCE_DELETE_HINT,
                    }),
                })
            }
            DeleteOutcome::Deleted(removed) => {
                info!(tenant_id, contact_id = %id, ?removed, "Deleted contact");
                if removed.any() {
                    Ok(format!(
                        "Contact deleted successfully. {} account link(s) and {} opportunity link(s) were also removed.",
                        removed.account_count, removed.opportunity_count
                    ))
                } else {
                    Ok("Contact deleted successfully".to_string())
                }
            }
        }
    }

    pub async fn relations(&self, tenant_id: i32, id: Uuid) -> ServiceResult<ContactRelations> {
        self.contacts.relations(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn stats(&self, tenant_id: i32, id: Uuid) -> ServiceResult<ContactStats> {
        self.contacts.stats(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn accounts(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Vec<AccountContactView>> {
        self.get(tenant_id, id).await?;
        let filters = AccountContactFilters { account_id: None, contact_id: Some(id) };
        Ok(self.account_links.list(tenant_id, &filters).await?)
    }

    pub async fn opportunities(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Vec<OpportunityContactView>> {
        self.get(tenant_id, id).await?;
        let filters = OpportunityContactFilters { opportunity_id: None, contact_id: Some(id) };
        Ok(self.opportunity_links.list(tenant_id, &filters).await?)
    }
}
