use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use super::{OrNotFound, ServiceError, ServiceResult, NO_FIELDS};
use crate::database::models::relationship::{NOT_FOUND, SELF_RELATIONSHIP};
use crate::database::models::{
    account, AccountHierarchy, AccountRelationship, AccountRelationshipView, NewAccountRelationship,
    RelationshipFilters, RelationshipPatch,
};
use crate::repository::{RelationshipRepository, Repositories};

/// Parent/child edges between accounts
#[derive(Clone)]
pub struct RelationshipService {
    relationships: Arc<dyn RelationshipRepository>,
}

impl RelationshipService {
    pub fn new(repos: &Repositories) -> Self {
        Self { relationships: repos.relationships.clone() }
    }

    pub async fn create(
        &self,
        tenant_id: i32,
        actor: Option<i32>,
        input: NewAccountRelationship,
    ) -> ServiceResult<AccountRelationship> {
        let relationship = input
            .into_relationship(tenant_id, actor)
            .ok_or_else(|| ServiceError::validation("Parent account ID and child account ID are required"))?;
        if relationship.parent_account_id == relationship.child_account_id {
            return Err(ServiceError::validation(SELF_RELATIONSHIP));
        }

        self.relationships
            .create(relationship)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Account relationship rejected"))
    }

    pub async fn list(
        &self,
        tenant_id: i32,
        filters: &RelationshipFilters,
    ) -> ServiceResult<Vec<AccountRelationshipView>> {
        Ok(self.relationships.list(tenant_id, filters).await?)
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<AccountRelationshipView> {
        self.relationships.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &RelationshipPatch,
    ) -> ServiceResult<AccountRelationship> {
        if patch.assignments().is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.relationships.update(tenant_id, id, patch).await?.into_result()
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid) -> ServiceResult<()> {
        if !self.relationships.delete(tenant_id, id).await? {
            return Err(ServiceError::not_found(NOT_FOUND));
        }
        Ok(())
    }

    pub async fn hierarchy(&self, tenant_id: i32, account_id: Uuid) -> ServiceResult<AccountHierarchy> {
        self.relationships.hierarchy(tenant_id, account_id).await?.or_not_found(account::NOT_FOUND)
    }
}
