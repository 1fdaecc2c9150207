//! Tenant-scoped data access.
//!
//! Each resource has an async trait so services depend on a capability, not
//! on a pool. The `Pg*` types are the production implementations; every
//! statement they issue is filtered by the tenant id passed in.

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::DatabaseError;

pub mod account;
pub mod account_contact;
pub mod contact;
pub mod custom_field;
pub mod dashboard;
pub mod opportunity;
pub mod opportunity_contact;
pub mod relationship;
pub mod search;
pub mod stage;
pub mod tenant;

pub use account::{AccountRepository, PgAccountRepository};
pub use account_contact::{AccountContactRepository, PgAccountContactRepository};
pub use contact::{ContactRepository, PgContactRepository};
pub use custom_field::{CustomFieldRepository, PgCustomFieldRepository};
pub use dashboard::{DashboardRepository, PgDashboardRepository};
pub use opportunity::{OpportunityRepository, PgOpportunityRepository};
pub use opportunity_contact::{OpportunityContactRepository, PgOpportunityContactRepository};
pub use relationship::{
    PgRelationshipRepository, PgRelationshipTypeRepository, RelationshipRepository, RelationshipTypeRepository,
};
pub use search::{PgSearchRepository, SearchRepository};
pub use stage::{PgStageRepository, StageRepository};
pub use tenant::{PgTenantDirectory, PgTenantRepository, TenantDirectory, TenantRepository};

pub type RepoResult<T> = Result<T, DatabaseError>;

/// One page of rows plus the unpaged match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
}

/// Result of an insert or update that is subject to tenant-level rules
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Written(T),
    /// A uniqueness rule was violated; carries the client message
    Conflict(&'static str),
    /// The row, or a row it references, does not exist in the tenant
    Missing(&'static str),
}

/// Result of a guarded delete. `C` is the dependent count that was either
/// removed (`Deleted`) or that blocked the delete (`Blocked`).
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome<C> {
    Deleted(C),
    Blocked(C),
    Missing,
}

/// Every repository the services need, behind trait objects
#[derive(Clone)]
pub struct Repositories {
    pub tenant_directory: Arc<dyn TenantDirectory>,
    pub tenants: Arc<dyn TenantRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub contacts: Arc<dyn ContactRepository>,
    pub account_contacts: Arc<dyn AccountContactRepository>,
    pub opportunities: Arc<dyn OpportunityRepository>,
    pub opportunity_contacts: Arc<dyn OpportunityContactRepository>,
    pub stages: Arc<dyn StageRepository>,
    pub custom_fields: Arc<dyn CustomFieldRepository>,
    pub relationships: Arc<dyn RelationshipRepository>,
    pub relationship_types: Arc<dyn RelationshipTypeRepository>,
    pub search: Arc<dyn SearchRepository>,
    pub dashboard: Arc<dyn DashboardRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            tenant_directory: Arc::new(PgTenantDirectory::new(pool.clone())),
            tenants: Arc::new(PgTenantRepository::new(pool.clone())),
            accounts: Arc::new(PgAccountRepository::new(pool.clone())),
            contacts: Arc::new(PgContactRepository::new(pool.clone())),
            account_contacts: Arc::new(PgAccountContactRepository::new(pool.clone())),
            opportunities: Arc::new(PgOpportunityRepository::new(pool.clone())),
            opportunity_contacts: Arc::new(PgOpportunityContactRepository::new(pool.clone())),
            stages: Arc::new(PgStageRepository::new(pool.clone())),
            custom_fields: Arc::new(PgCustomFieldRepository::new(pool.clone())),
            relationships: Arc::new(PgRelationshipRepository::new(pool.clone())),
            relationship_types: Arc::new(PgRelationshipTypeRepository::new(pool.clone())),
            search: Arc::new(PgSearchRepository::new(pool.clone())),
            dashboard: Arc::new(PgDashboardRepository::new(pool)),
        }
    }
}
