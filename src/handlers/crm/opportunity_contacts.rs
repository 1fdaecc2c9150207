use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    NewOpportunityContact, OpportunityContact, OpportunityContactFilters, OpportunityContactPatch,
    OpportunityContactView,
};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// POST /api/crm/opportunities/contacts
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewOpportunityContact>,
) -> ApiResult<OpportunityContact> {
    let link = state.services.opportunity_contacts.create(tenant.tenant_id, body).await?;
    Ok(ApiResponse::created(link).with_message("Contact added to opportunity successfully"))
}

/// GET /api/crm/opportunities/contacts?opportunity_id&contact_id
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(filters): ApiQuery<OpportunityContactFilters>,
) -> ApiResult<Vec<OpportunityContactView>> {
    Ok(ApiResponse::success(state.services.opportunity_contacts.list(tenant.tenant_id, &filters).await?))
}

/// PUT /api/crm/opportunities/contacts/:id
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<OpportunityContactPatch>,
) -> ApiResult<OpportunityContact> {
    let link = state.services.opportunity_contacts.update(tenant.tenant_id, id, &patch).await?;
    Ok(ApiResponse::success(link).with_message("Opportunity contact role updated successfully"))
}

/// DELETE /api/crm/opportunities/contacts/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.services.opportunity_contacts.delete(tenant.tenant_id, id).await?;
    Ok(ApiResponse::message("Contact removed from opportunity successfully"))
}
