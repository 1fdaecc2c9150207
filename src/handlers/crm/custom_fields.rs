use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    CustomFieldDefinition, CustomFieldFilters, CustomFieldPatch, CustomFieldSchema, NewCustomField,
};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/custom-fields?table_name
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(filters): ApiQuery<CustomFieldFilters>,
) -> ApiResult<Vec<CustomFieldDefinition>> {
    Ok(ApiResponse::success(state.services.custom_fields.list(tenant.tenant_id, &filters).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<CustomFieldDefinition> {
    Ok(ApiResponse::success(state.services.custom_fields.get(tenant.tenant_id, id).await?))
}

pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewCustomField>,
) -> ApiResult<CustomFieldDefinition> {
    let field = state.services.custom_fields.create(tenant.tenant_id, body).await?;
    Ok(ApiResponse::created(field).with_message("Custom field created successfully"))
}

pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<CustomFieldPatch>,
) -> ApiResult<CustomFieldDefinition> {
    let field = state.services.custom_fields.update(tenant.tenant_id, id, &patch).await?;
    Ok(ApiResponse::success(field).with_message("Custom field updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.services.custom_fields.delete(tenant.tenant_id, id).await?;
    Ok(ApiResponse::message("Custom field deleted successfully"))
}

/// GET /api/crm/custom-fields/schema/:table_name
pub async fn schema(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(table_name): ApiPath<String>,
) -> ApiResult<CustomFieldSchema> {
    Ok(ApiResponse::success(state.services.custom_fields.schema(tenant.tenant_id, &table_name).await?))
}
