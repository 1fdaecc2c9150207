use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use super::{OrNotFound, ServiceError, ServiceResult};
use crate::database::models::clean;
use crate::database::models::opportunity_contact::NOT_FOUND;
use crate::database::models::{
    NewOpportunityContact, OpportunityContact, OpportunityContactFilters, OpportunityContactPatch,
    OpportunityContactView,
};
use crate::repository::{OpportunityContactRepository, Repositories};

#[derive(Clone)]
pub struct OpportunityContactService {
    links: Arc<dyn OpportunityContactRepository>,
}

impl OpportunityContactService {
    pub fn new(repos: &Repositories) -> Self {
        Self { links: repos.opportunity_contacts.clone() }
    }

    pub async fn create(&self, tenant_id: i32, input: NewOpportunityContact) -> ServiceResult<OpportunityContact> {
        let link = input
            .into_link(tenant_id)
            .ok_or_else(|| ServiceError::validation("Opportunity ID and Contact ID are required"))?;

        self.links
            .create(link)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Opportunity contact link rejected"))
    }

    pub async fn list(
        &self,
        tenant_id: i32,
        filters: &OpportunityContactFilters,
    ) -> ServiceResult<Vec<OpportunityContactView>> {
        Ok(self.links.list(tenant_id, filters).await?)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        patch: &OpportunityContactPatch,
    ) -> ServiceResult<OpportunityContact> {
        let role = clean(&patch.role).ok_or_else(|| ServiceError::validation("Role is required"))?;
        self.links.update_role(tenant_id, id, &role).await?.or_not_found(NOT_FOUND)
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid) -> ServiceResult<()> {
        if !self.links.delete(tenant_id, id).await? {
            return Err(ServiceError::not_found(NOT_FOUND));
        }
        Ok(())
    }
}
