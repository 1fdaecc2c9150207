use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{OrNotFound, ServiceError, ServiceResult, NO_FIELDS};
use crate::database::models::stage::NOT_FOUND;
use crate::database::models::{NewStage, Stage, StagePatch, StageReorder};
use crate::repository::{DeleteOutcome, Repositories, StageRepository};

#[derive(Clone)]
pub struct StageService {
    stages: Arc<dyn StageRepository>,
}

impl StageService {
    pub fn new(repos: &Repositories) -> Self {
        Self { stages: repos.stages.clone() }
    }

    pub async fn list(&self, tenant_id: i32) -> ServiceResult<Vec<Stage>> {
        Ok(self.stages.list(tenant_id).await?)
    }

    pub async fn get(&self, tenant_id: i32, id: Uuid) -> ServiceResult<Stage> {
        self.stages.find(tenant_id, id).await?.or_not_found(NOT_FOUND)
    }

    pub async fn create(&self, tenant_id: i32, input: NewStage) -> ServiceResult<Stage> {
        let stage = input.into_stage(tenant_id).map_err(ServiceError::validation)?;
        let created = self
            .stages
            .create(stage)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, error = %e, "Stage create rejected"))?;
        info!(tenant_id, stage_id = %created.id, order_index = created.order_index, "Created stage");
        Ok(created)
    }

    pub async fn update(&self, tenant_id: i32, id: Uuid, patch: &StagePatch) -> ServiceResult<Stage> {
        let patch = patch.normalized();
        if patch.assignments().is_empty() {
            return Err(ServiceError::validation(NO_FIELDS));
        }
        let current = self.get(tenant_id, id).await?;
        patch.validate(&current).map_err(ServiceError::validation)?;

        self.stages
            .update(tenant_id, id, &patch)
            .await?
            .into_result()
            .inspect_err(|e| warn!(tenant_id, stage_id = %id, error = %e, "Stage update rejected"))
    }

    pub async fn delete(&self, tenant_id: i32, id: Uuid) -> ServiceResult<()> {
        match self.stages.delete(tenant_id, id).await? {
            DeleteOutcome::Missing => Err(ServiceError::not_found(NOT_FOUND)),
            DeleteOutcome::Blocked(opportunity_count) => {
                warn!(tenant_id, stage_id = %id, opportunity_count, "Stage delete blocked");
                Err(ServiceError::HasDependents {
                    message: "Cannot delete stage that is being used by opportunities".to_string(),
                    data: json!({ "opportunity_count": opportunity_count }),
                })
            }
            DeleteOutcome::Deleted(_) => Ok(()),
        }
    }

    pub async fn reorder(&self, tenant_id: i32, request: &StageReorder) -> ServiceResult<Vec<Stage>> {
        if request.stage_ids.is_empty() {
            return Err(ServiceError::validation("Stage IDs array is required"));
        }
        self.stages
            .reorder(tenant_id, &request.stage_ids)
            .await?
            .ok_or_else(|| ServiceError::validation("One or more stages not found"))
    }
}
