use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{NewStage, Stage, StagePatch, StageReorder};
use crate::handlers::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/stages - Ordered by `order_index`
pub async fn list(State(state): State<AppState>, Extension(tenant): Extension<TenantContext>) -> ApiResult<Vec<Stage>> {
    Ok(ApiResponse::success(state.services.stages.list(tenant.tenant_id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Stage> {
    Ok(ApiResponse::success(state.services.stages.get(tenant.tenant_id, id).await?))
}

pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewStage>,
) -> ApiResult<Stage> {
    let stage = state.services.stages.create(tenant.tenant_id, body).await?;
    Ok(ApiResponse::created(stage).with_message("Stage created successfully"))
}

pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<StagePatch>,
) -> ApiResult<Stage> {
    let stage = state.services.stages.update(tenant.tenant_id, id, &patch).await?;
    Ok(ApiResponse::success(stage).with_message("Stage updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.services.stages.delete(tenant.tenant_id, id).await?;
    Ok(ApiResponse::message("Stage deleted successfully"))
}

/// PUT /api/crm/stages/reorder - `{ stageIds: [...] }`
pub async fn reorder(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<StageReorder>,
) -> ApiResult<Vec<Stage>> {
    let stages = state.services.stages.reorder(tenant.tenant_id, &body).await?;
    Ok(ApiResponse::success(stages).with_message("Stages reordered successfully"))
}
