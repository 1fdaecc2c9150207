use axum::extract::{Extension, State};

use crate::database::models::{GlobalSearchParams, GlobalSearchResult, SearchRequest};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::search::EntitySearchResult;
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/search?query&limit - Accounts, contacts and opportunities at once
pub async fn global(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(params): ApiQuery<GlobalSearchParams>,
) -> ApiResult<GlobalSearchResult> {
    Ok(ApiResponse::success(state.services.search.global(tenant.tenant_id, &params).await?))
}

/// POST /api/crm/search/:entity_type
pub async fn entity(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(entity_type): ApiPath<String>,
    ApiJson(body): ApiJson<SearchRequest>,
) -> ApiResult<EntitySearchResult> {
    let result = state.services.search.entity(tenant.tenant_id, &entity_type, &body).await?;
    Ok(ApiResponse::success(result))
}
