use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{search_params, Listed, OrNotFound, Searched, ServiceError, ServiceResult, FORCE_DELETE_HINT, NO_FIELDS};
use crate::config::PaginationConfig;
use crate::database::models::opportunity::NOT_FOUND;
use crate::database::models::{
    NewOpportunity, Opportunity, OpportunityContactFilters, OpportunityContactView, OpportunityFilters,
    OpportunityPatch, OpportunityRelations, OpportunitySearchFilters, OpportunitySummary, PipelineColumn,
    SearchRequest, StageHistoryEntry, StageMove, StageMoved,
};
use crate::database::PageParams;
use crate::repository::{DeleteOutcome, OpportunityContactRepository, OpportunityRepository, Repositories};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpportunityRelationCheck {
    pub opportunity_id: Uuid,
    pub contact_count: i64,
    pub has_related_data: bool,
}

#[derive(Clone)]
pub struct OpportunityService {
    opportunities: Arc<dyn OpportunityRepository>,
    links: Arc<dyn OpportunityContactRepository>,
    pagination: PaginationConfig,
}

impl OpportunityService {
    pub fn new(repos: &Repositories, pagination: PaginationConfig) -> Self {
        Self {
            opportunities: repos.opportunities.clone(),
            links: repos.opportunity_contacts.clone(),
            pagination,
        }
    }

    pub async fn list(
        &self,
        tenant_id: i32,
        filters: &OpportunityFilters,
        page: &PageParams,
    ) -> ServiceResult<Listed<OpportunitySummary>> {
        let filters = filters.parse().map_err(ServiceError::Validation)?;
        let page = page.to_request(self.pagination.default_limit)?;
        let found = self.opportunities.list(tenant_id, &filters, &page).await?;
        Ok(Listed { pagination: page.pagination(found.total), rows: found.rows })
    }

    pub async fn search(
        &self,
        tenant_id: i32,
        request: &SearchRequest<OpportunitySearchFilters>,
    ) -> ServiceResult<Searched<OpportunitySummary>> {
        let (term, window) = search_params(request, &self.pagination)?;
        let found = self.opportunities.search(tenant_id, &term, &request.filters, &window).await?;
        Ok(Searched { pagination: window.pagination(found.total), rows: found.rows })
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<OpportunitySummary> {
        self.opportunities.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn create(
        &self,
        tenant_id: i32,
        actor: Option<i32>,
        input: NewOpportunity,
    ) -> ServiceResult<Opportunity> {
        let opportunity = input
            .into_opportunity(tenant_id, actor)
            .ok_or_else(|| ServiceError::validation("Opportunity name and account ID are required"))?;

        let created = self
            .opportunities
            .create(opportunity)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Opportunity create rejected"))?;
        info!(tenant_id, opportunity_id = %created.id, stage = ?created.stage, "Created opportunity");
        Ok(created)
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        id: Uuid,
        actor: Option<i32>,
        patch: &OpportunityPatch,
    ) -> ServiceResult<Opportunity> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        self.opportunities
            .update(tenant_id, id, &patch, actor)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, opportunity_id = %id, error = %e, "Opportunity update rejected"))
    }

    pub async fn check_relations(&self, tenant_id: i32, id: Uuid) -> ServiceResult<OpportunityRelationCheck> {
        let counts = self.opportunities.dependents(tenant_id, id).await?.or_not_found(NOT_FOUND)?;
        Ok(OpportunityRelationCheck {
            opportunity_id: id,
            contact_count: counts.contact_count,
            has_related_data: counts.contact_count > 0,
        })
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid, force: bool) -> ServiceResult<String> {
        match self.opportunities.delete(tenant_id, id, force).await? {
            DeleteOutcome::Missing => Err(ServiceError::not_found(NOT_FOUND)),
            DeleteOutcome::Blocked(counts) => {
                warn!(tenant_id, opportunity_id = %id, contact_count = counts.contact_count, "Opportunity delete blocked");
                Err(ServiceError::HasDependents {
                    message: "Cannot delete opportunity with related contacts".to_string(),
                    data: json!({
                        "contact_count": counts.contact_count,
                        "suggestion": FORCE_DELETE_HINT,
                    }),
                })
            }
            DeleteOutcome::Deleted(removed) => {
                info!(tenant_id, opportunity_id = %id, contact_count = removed.contact_count, "Deleted opportunity");
                if removed.contact_count > 0 {
                    Ok(format!(
                        "Opportunity deleted successfully. {} related contact(s) were also removed.",
                        removed.contact_count
                    ))
                } else {
                    Ok("Opportunity deleted successfully".to_string())
                }
            }
        }
    }

    pub async fn relations(&self, tenant_id: i32, id: Uuid) -> ServiceResult<OpportunityRelations> {
        self.opportunities.relations(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn contacts(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Vec<OpportunityContactView>> {
        self.get(tenant_id, id).await?;
        let filters = OpportunityContactFilters { opportunity_id: Some(id), contact_id: None };
        Ok(self.links.list(tenant_id, &filters).await?)
    }

    pub async fn stage_history(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Vec<StageHistoryEntry>> {
        self.opportunities.stage_history(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn move_stage(&self, tenant_id: i32, id: Uuid, user_id: i32, body: &StageMove) -> ServiceResult<StageMoved> {
        let stage_id = body.stage_id.ok_or_else(|| ServiceError::validation("stage_id is required"))?;
        let entry = self
            .opportunities
            .move_stage(tenant_id, id, stage_id, user_id, body.reason())
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, opportunity_id = %id, error = %e, "Stage move rejected"))?;
        info!(tenant_id, opportunity_id = %id, from = ?entry.from_stage_id, to = %entry.stage_id, "Moved opportunity stage");
        Ok(StageMoved { history_entry: entry, opportunity_updated: true })
    }

    pub async fn stage_history_details(
        &self,
        tenant_id: i32,
        id: Uuid,
        user_id: i32,
    ) -> ServiceResult<Vec<StageHistoryEntry>> {
        self.opportunities
            .stage_history_details(tenant_id, id, user_id)
            .await?
            .or_not_found(NOT_FOUND)
    }

    pub async fn pipeline(&self, tenant_id: i32) -> ServiceResult<Vec<PipelineColumn>> {
        Ok(self.opportunities.pipeline(tenant_id).await?)
    }
}
