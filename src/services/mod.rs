//! Business rules of the CRM resources.
//!
//! Services validate input, call the repositories with the resolved tenant
//! id and turn repository outcomes into [`ServiceError`]s. They never see
//! HTTP types.

pub mod account_contacts;
pub mod accounts;
pub mod contacts;
pub mod custom_fields;
pub mod dashboard;
pub mod error;
pub mod opportunities;
pub mod opportunity_contacts;
pub mod relationship_types;
pub mod relationships;
pub mod search;
pub mod stages;
pub mod tenant;
pub mod tenant_resolver;

pub use account_contacts::AccountContactService;
pub use accounts::AccountService;
pub use contacts::ContactService;
pub use custom_fields::CustomFieldService;
pub use dashboard::DashboardService;
pub use error::{OrNotFound, ServiceError, ServiceResult};
pub use opportunities::OpportunityService;
pub use opportunity_contacts::OpportunityContactService;
pub use relationship_types::RelationshipTypeService;
pub use relationships::RelationshipService;
pub use search::SearchService;
pub use stages::StageService;
pub use tenant::TenantService;
pub use tenant_resolver::{ResolvedFrom, TenantContext, TenantError, TenantResolver, TenantSource};

use crate::config::PaginationConfig;
use crate::database::models::search::{search_term, QUERY_TOO_SHORT};
use crate::database::models::SearchRequest;
use crate::database::{PageError, Pagination, SearchWindow, WindowPagination};
use crate::repository::Repositories;

pub const NO_FIELDS: &str = "No valid fields to update";
pub const FORCE_DELETE_HINT: &str = "Use forceDelete=true to proceed with deletion";

impl From<PageError> for ServiceError {
    fn from(err: PageError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// One page of a list endpoint
#[derive(Debug, Clone)]
pub struct Listed<T> {
    pub rows: Vec<T>,
    pub pagination: Pagination,
}

/// One window of a POST search endpoint
#[derive(Debug, Clone)]
pub struct Searched<T> {
    pub rows: Vec<T>,
    pub pagination: WindowPagination,
}

/// Trimmed term and capped window of a search body
pub(crate) fn search_params<F>(
    request: &SearchRequest<F>,
    pagination: &PaginationConfig,
) -> ServiceResult<(String, SearchWindow)> {
    let term = search_term(&request.query).ok_or_else(|| ServiceError::validation(QUERY_TOO_SHORT))?;
    let window = SearchWindow::new(
        request.limit,
        request.offset,
        pagination.default_search_limit,
        pagination.max_search_limit,
    )?;
    Ok((term, window))
}

/// Every resource service, built once from the repositories
#[derive(Clone)]
pub struct Services {
    pub resolver: TenantResolver,
    pub accounts: AccountService,
    pub contacts: ContactService,
    pub account_contacts: AccountContactService,
    pub opportunities: OpportunityService,
    pub opportunity_contacts: OpportunityContactService,
    pub stages: StageService,
    pub custom_fields: CustomFieldService,
    pub relationships: RelationshipService,
    pub relationship_types: RelationshipTypeService,
    pub search: SearchService,
    pub tenant: TenantService,
    pub dashboard: DashboardService,
}

impl Services {
    pub fn new(repos: &Repositories, pagination: &PaginationConfig) -> Self {
        Self {
            resolver: TenantResolver::new(repos.tenant_directory.clone()),
            accounts: AccountService::new(repos, pagination.clone()),
            contacts: ContactService::new(repos, pagination.clone()),
            account_contacts: AccountContactService::new(repos),
            opportunities: OpportunityService::new(repos, pagination.clone()),
            opportunity_contacts: OpportunityContactService::new(repos),
            stages: StageService::new(repos),
            custom_fields: CustomFieldService::new(repos),
            relationships: RelationshipService::new(repos),
            relationship_types: RelationshipTypeService::new(repos),
            search: SearchService::new(repos, pagination.clone()),
            tenant: TenantService::new(repos),
            dashboard: DashboardService::new(repos),
        }
    }
}
