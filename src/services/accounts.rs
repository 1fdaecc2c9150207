use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{search_params, Listed, OrNotFound, Searched, ServiceError, ServiceResult, FORCE_DELETE_HINT, NO_FIELDS};
use crate::config::PaginationConfig;
use crate::database::models::account::NOT_FOUND;
use crate::database::models::{
    Account, AccountContactFilters, AccountContactView, AccountFilters, AccountHierarchy, AccountPatch,
    AccountPipelineRow, AccountRelations, AccountSearchFilters, AccountSummary, NewAccount, SearchRequest,
};
use crate::database::PageParams;
use crate::repository::{
    AccountContactRepository, AccountRepository, DeleteOutcome, RelationshipRepository, Repositories,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountRelationCheck {
    pub account_id: Uuid,
    pub contact_count: i64,
    pub opportunity_count: i64,
    pub has_related_data: bool,
}

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    links: Arc<dyn AccountContactRepository>,
    relationships: Arc<dyn RelationshipRepository>,
    pagination: PaginationConfig,
}

impl AccountService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            accounts: repos.accounts.clone(),
            links: repos.account_contacts.clone(),
            relationships: repos.relationships.clone(),
            pagination,
        }
    }

    pub async fn list(
        &self,
        tenant_id: i32,
        filters: &AccountFilters,
        page: &PageParams,
    ) -> ServiceResult<Listed<AccountSummary>> {
        let page = page.to_request(self.pagination.default_limit)?;
        let found = self.accounts.list(tenant_id, filters, &page).await?;
        Ok(Listed { pagination: page.pagination(found.total), rows: found.rows })
    }

    pub async fn search(
        &self,
        tenant_id: i32,
        request: &SearchRequest<AccountSearchFilters>,
    ) -> ServiceResult<Searched<Account>> {
        let (term, window) = search_params(request, &self.pagination)?;
        let found = self.accounts.search(tenant_id, &term, &request.filters, &window).await?;
        Ok(Searched { pagination: window.pagination(found.total), rows: found.rows })
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Account> {
        self.accounts.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn create(&self, tenant_id: i32, actor: Option<i32>, input: NewAccount) -> ServiceResult<Account> {
        let account = input
            .into_account(tenant_id, actor)
            .ok_or_else(|| ServiceError::validation("Account name is required"))?;

        let created = self
            .accounts
            .create(account)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Account create rejected"))?;
        info!(tenant_id, account_id = %created.id, "Created account");
        Ok(created)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        actor: Option<i32>,
        patch: &AccountPatch,
    ) -> ServiceResult<Account> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.accounts
            .update(tenant_id, id, &patch, actor)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, account_id = %id, error = %e, "Account update rejected"))
    }

    pub async fn check_relations(&self, tenant_id: i32, id: Uuid) -> ServiceResult<AccountRelationCheck> {
        let counts = self.accounts.dependents(tenant_id, id).await?.or_not_found(NOT_FOUND)?;
        Ok(AccountRelationCheck {
            account_id: id,
            contact_count: counts.contact_count,
            opportunity_count: counts.opportunity_count,
            has_related_data: counts.any(),
        })
    }

    /// Returns the success message, which reports what `force` removed
    pub async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> ServiceResult<String> {
        match self.accounts.delete(tenant_id, id, force).await? {
            DeleteOutcome::Missing => Err(ServiceError::not_found(NOT_FOUND)),
            DeleteOutcome::Blocked(counts) => {
                warn!(tenant_id, account_id = %id, ?counts, "Account delete blocked by related data");
                Err(ServiceError::HasDependents {
                    message: "Cannot delete account with related data".to_string(),
                    data: json!({
                        "contact_count": counts.contact_count,
                        "opportunity_count": counts.opportunity_count,
                        "suggestion": FORCE_DELETE_HINT,
                    }),
                })
            }
            DeleteOutcome::Deleted(removed) => {
                info!(tenant_id, account_id = %id, ?removed, "Deleted account");
                if removed.any() {
                    Ok(format!(
                        "Account deleted successfully. {} related contact(s) and {} related opportunity(ies) were also removed.",
                        removed.contact_count, removed.opportunity_count
                    ))
                } else {
                    Ok("Account deleted successfully".to_string())
                }
            }
        }
    }

    pub async fn relations(&self, tenant_id: i32, id: Uuid) -> ServiceResult<AccountRelations> {
        self.accounts.relations(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn contacts(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Vec<AccountContactView>> {
        self.get(tenant_id, id).await?;
        let filters = AccountContactFilters { account_id: Some(id), contact_id: None };
        Ok(self.links.list(tenant_id, &filters).await?)
    }

    pub async fn hierarchy(&self, tenant_id: i32, id: Uuid) -> ServiceResult<AccountHierarchy> {
        self.relationships.hierarchy(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn pipeline(&self, tenant_id: i32) -> ServiceResult<Vec<AccountPipelineRow>> {
        Ok(self.accounts.pipeline(tenant_id).await?)
    }
}
