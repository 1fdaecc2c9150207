use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    AccountHierarchy, AccountRelationship, AccountRelationshipView, NewAccountRelationship, RelationshipFilters,
    RelationshipPatch,
};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TenantContext;
use crate::state::AppState;

/// POST /api/crm/relationships - Parent/child edge between two accounts
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewAccountRelationship>,
) -> ApiResult<AccountRelationship> {
    let edge = state.services.relationships.create(tenant.tenant_id, Some(user.id), body).await?;
    Ok(ApiResponse::created(edge).with_message("Account relationship created successfully"))
}

/// GET /api/crm/relationships?account_id&relationship_type
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(filters): ApiQuery<RelationshipFilters>,
) -> ApiResult<Vec<AccountRelationshipView>> {
    Ok(ApiResponse::success(state.services.relationships.list(tenant.tenant_id, &filters).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AccountRelationshipView> {
    Ok(ApiResponse::success(state.services.relationships.get(tenant.tenant_id, id).await?))
}

pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<RelationshipPatch>,
) -> ApiResult<AccountRelationship> {
    let edge = state.services.relationships.update(tenant.tenant_id, id, &patch).await?;
    Ok(ApiResponse::success(edge).with_message("Account relationship updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.services.relationships.delete(tenant.tenant_id, id).await?;
    Ok(ApiResponse::message("Account relationship deleted successfully"))
}

/// GET /api/crm/relationships/hierarchy/:account_id
pub async fn hierarchy(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(account_id): ApiPath<Uuid>,
) -> ApiResult<AccountHierarchy> {
    Ok(ApiResponse::success(state.services.relationships.hierarchy(tenant.tenant_id, account_id).await?))
}
