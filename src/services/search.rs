use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{search_params, ServiceError, ServiceResult};
use crate::config::PaginationConfig;
use crate::database::models::search::{search_term, EntityType, INVALID_ENTITY_TYPE, QUERY_TOO_SHORT};
use crate::database::models::{
    Account, Contact, GlobalSearchParams, GlobalSearchResult, OpportunitySummary, SearchRequest,
};
use crate::database::{SearchWindow, WindowPagination};
use crate::repository::{
    AccountRepository, ContactRepository, OpportunityRepository, Page, Repositories, SearchRepository,
};

/// Rows of one entity search; serialized as a plain array
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityRows {
    Accounts(Vec<Account>),
    Contacts(Vec<Contact>),
    Opportunities(Vec<OpportunitySummary>),
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySearchResult {
    pub entity_type: &'static str,
    pub query: String,
    pub results: EntityRows,
    pub total: i64,
    pub pagination: WindowPagination,
}

/// `null` or a missing object means "no filters"
fn filters_from<F: DeserializeOwned + Default>(value: &Value) -> ServiceResult<F> {
    if value.is_null() {
        return Ok(F::default());
    }
    serde_json::from_value(value.clone()).map_err(|e| ServiceError::validation(format!("Invalid filters: {e}")))
}

#[derive(Clone)]
pub struct SearchService {
    search: Arc<dyn SearchRepository>,
    accounts: Arc<dyn AccountRepository>,
    contacts: Arc<dyn ContactRepository>,
    opportunities: Arc<dyn OpportunityRepository>,
    pagination: PaginationConfig,
}

impl SearchService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            search: repos.search.clone(),
            accounts: repos.accounts.clone(),
            contacts: repos.contacts.clone(),
            opportunities: repos.opportunities.clone(),
            pagination,
        }
    }

    pub async fn global(&self, tenant_id: i32, params: &GlobalSearchParams) -> ServiceResult<GlobalSearchResult> {
        let term = search_term(&params.query).ok_or_else(|| ServiceError::validation(QUERY_TOO_SHORT))?;
        let window = SearchWindow::new(
            params.limit,
            None,
            self.pagination.default_search_limit,
            self.pagination.max_search_limit,
        )?;

        let (total_results, results) = self.search.global(tenant_id, &term, window.limit).await?;
        debug!(tenant_id, query = %term, total_results, returned = results.len(), "Global search");
        Ok(GlobalSearchResult { query: term, total_results, results })
    }

    pub async fn entity(
        &self,
        tenant_id: i32,
        entity_type: &str,
        request: &SearchRequest<Value>,
    ) -> ServiceResult<EntitySearchResult> {
        let kind = EntityType::parse(entity_type).ok_or_else(|| ServiceError::validation(INVALID_ENTITY_TYPE))?;
        let (term, window) = search_params(request, &self.pagination)?;

        let (results, total) = match kind {
            EntityType::Accounts => {
                let filters = filters_from(&request.filters)?;
                let Page { rows, total } = self.accounts.search(tenant_id, &term, &filters, &window).await?;
                (EntityRows::Accounts(rows), total)
            }
            EntityType::Contacts => {
                let filters = filters_from(&request.filters)?;
                let Page { rows, total } = self.contacts.search(tenant_id, &term, &filters, &window).await?;
                (EntityRows::Contacts(rows), total)
            }
            EntityType::Opportunities => {
                let filters = filters_from(&request.filters)?;
                let Page { rows, total } = self.opportunities.search(tenant_id, &term, &filters, &window).await?;
                (EntityRows::Opportunities(rows), total)
            }
        };

        Ok(EntitySearchResult {
            entity_type: kind.as_str(),
            query: term,
            results,
            total,
            pagination: window.pagination(total),
        })
    }
}
