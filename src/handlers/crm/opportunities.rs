use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    NewOpportunity, Opportunity, OpportunityContactView, OpportunityFilters, OpportunityPatch,
    OpportunityRelations, OpportunitySearchFilters, OpportunitySummary, PipelineColumn, SearchRequest,
    StageHistoryEntry, StageMove, StageMoved,
};
use crate::database::PageParams;
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery, DeleteParams};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::opportunities::OpportunityRelationCheck;
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/opportunities - `limit=-1` returns every row
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filters): ApiQuery<OpportunityFilters>,
) -> ApiResult<Vec<OpportunitySummary>> {
    Ok(state.services.opportunities.list(tenant.tenant_id, &filters, &page).await?.into())
}

/// POST /api/crm/opportunities/search
pub async fn search(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<SearchRequest<OpportunitySearchFilters>>,
) -> ApiResult<Vec<OpportunitySummary>> {
    Ok(state.services.opportunities.search(tenant.tenant_id, &body).await?.into())
}

/// GET /api/crm/opportunities/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<OpportunitySummary> {
    Ok(ApiResponse::success(state.services.opportunities.get(tenant.tenant_id, id).await?))
}

/// POST /api/crm/opportunities
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewOpportunity>,
) -> ApiResult<Opportunity> {
    let opportunity = state.services.opportunities.create(tenant.tenant_id, Some(user.id), body).await?;
    Ok(ApiResponse::created(opportunity).with_message("Opportunity created successfully"))
}

/// PUT /api/crm/opportunities/:id
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<OpportunityPatch>,
) -> ApiResult<Opportunity> {
    let opportunity = state
        .services
        .opportunities
        .update(tenant.tenant_id, id, Some(user.id), &patch)
        .await?;
    Ok(ApiResponse::success(opportunity).with_message("Opportunity updated successfully"))
}

/// DELETE /api/crm/opportunities/:id?forceDelete=true
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> ApiResult<()> {
    let message = state.services.opportunities.delete(tenant.tenant_id, id, params.force()).await?;
    Ok(ApiResponse::message(message))
}

/// GET /api/crm/opportunities/:id/check-relations
pub async fn check_relations(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<OpportunityRelationCheck> {
    Ok(ApiResponse::success(state.services.opportunities.check_relations(tenant.tenant_id, id).await?))
}

/// GET /api/crm/opportunities/:id/relationships
pub async fn relations(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<OpportunityRelations> {
    Ok(ApiResponse::success(state.services.opportunities.relations(tenant.tenant_id, id).await?))
}

/// GET /api/crm/opportunities/:id/contacts
pub async fn contacts(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<OpportunityContactView>> {
    Ok(ApiResponse::success(state.services.opportunities.contacts(tenant.tenant_id, id).await?))
}

/// GET /api/crm/opportunities/:id/stage-history
pub async fn stage_history(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<StageHistoryEntry>> {
    Ok(ApiResponse::success(state.services.opportunities.stage_history(tenant.tenant_id, id).await?))
}

/// GET /api/crm/opportunities/:id/stage-history-details - the caller's annotated moves, newest first
pub async fn stage_history_details(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<StageHistoryEntry>> {
    let rows = state
        .services
        .opportunities
        .stage_history_details(tenant.tenant_id, id, user.id)
        .await?;
    Ok(ApiResponse::success(rows))
}

/// PUT /api/crm/opportunities/stage-history/:id
pub async fn move_stage(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<StageMove>,
) -> ApiResult<StageMoved> {
    let moved = state.services.opportunities.move_stage(tenant.tenant_id, id, user.id, &body).await?;
    Ok(ApiResponse::success(moved).with_message("Stage history entry added successfully"))
}

/// GET /api/crm/opportunities/pipeline
pub async fn pipeline(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<PipelineColumn>> {
    Ok(ApiResponse::success(state.services.opportunities.pipeline(tenant.tenant_id).await?))
}
