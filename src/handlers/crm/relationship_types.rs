use axum::extract::{Extension, State};

use crate::database::models::{
    BulkTypeRename, EntityCombination, NewRelationshipType, RelationshipType, RelationshipTypeFilters,
    RelationshipTypeRename, SortOrderUpdate, TypeRenameResult, TypeUsageStats,
};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/relationship-types?entity_type_from&entity_type_to
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(filters): ApiQuery<RelationshipTypeFilters>,
) -> ApiResult<Vec<RelationshipType>> {
    Ok(ApiResponse::success(state.services.relationship_types.list(tenant.tenant_id, &filters).await?))
}

/// POST /api/crm/relationship-types - validation only
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewRelationshipType>,
) -> ApiResult<RelationshipType> {
    let validated = state.services.relationship_types.create(tenant.tenant_id, &body).await?;
    Ok(ApiResponse::created(validated).with_message(
        "Relationship type validated successfully. It will be created when used in an actual relationship.",
    ))
}

/// GET /api/crm/relationship-types/entity-combinations
pub async fn combinations(State(state): State<AppState>) -> ApiResult<Vec<EntityCombination>> {
    Ok(ApiResponse::success(state.services.relationship_types.combinations()))
}

/// PUT /api/crm/relationship-types/sort-order
pub async fn sort_order(State(state): State<AppState>, ApiJson(body): ApiJson<SortOrderUpdate>) -> ApiResult<()> {
    state.services.relationship_types.sort_order(&body)?;
    Ok(ApiResponse::message("Sort order updated successfully"))
}

/// PUT /api/crm/relationship-types/bulk-update
pub async fn bulk_update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<BulkTypeRename>,
) -> ApiResult<Vec<TypeRenameResult>> {
    let results = state.services.relationship_types.bulk_rename(tenant.tenant_id, &body).await?;
    Ok(ApiResponse::success(results).with_message("Bulk update completed"))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<RelationshipType> {
    Ok(ApiResponse::success(state.services.relationship_types.get(tenant.tenant_id, &name).await?))
}

/// PUT /api/crm/relationship-types/:name - renames every account edge of the type
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(name): ApiPath<String>,
    ApiJson(body): ApiJson<RelationshipTypeRename>,
) -> ApiResult<RelationshipType> {
    let renamed = state.services.relationship_types.rename(tenant.tenant_id, &name, &body).await?;
    Ok(ApiResponse::success(renamed).with_message("Relationship type updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<()> {
    state.services.relationship_types.delete(tenant.tenant_id, &name).await?;
    Ok(ApiResponse::message("Relationship type deleted successfully"))
}

/// GET /api/crm/relationship-types/:name/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<TypeUsageStats> {
    Ok(ApiResponse::success(state.services.relationship_types.stats(tenant.tenant_id, &name).await?))
}
