use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    Account, AccountContactView, AccountFilters, AccountHierarchy, AccountPatch, AccountPipelineRow,
    AccountRelations, AccountSearchFilters, AccountSummary, NewAccount, SearchRequest,
};
use crate::database::PageParams;
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery, DeleteParams};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::accounts::AccountRelationCheck;
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/accounts - Paged list with contact/opportunity counters
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filters): ApiQuery<AccountFilters>,
) -> ApiResult<Vec<AccountSummary>> {
    let listed = state.services.accounts.list(tenant.tenant_id, &filters, &page).await?;
    Ok(listed.into())
}

/// POST /api/crm/accounts/search
pub async fn search(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<SearchRequest<AccountSearchFilters>>,
) -> ApiResult<Vec<Account>> {
    let found = state.services.accounts.search(tenant.tenant_id, &body).await?;
    Ok(found.into())
}

/// GET /api/crm/accounts/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Account> {
    let account = state.services.accounts.get(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(account))
}

/// POST /api/crm/accounts
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewAccount>,
) -> ApiResult<Account> {
    let account = state.services.accounts.create(tenant.tenant_id, Some(user.id), body).await?;
    Ok(ApiResponse::created(account).with_message("Account created successfully"))
}

/// PUT /api/crm/accounts/:id
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<AccountPatch>,
) -> ApiResult<Account> {
    let account = state.services.accounts.update(tenant.tenant_id, id, Some(user.id), &patch).await?;
    Ok(ApiResponse::success(account).with_message("Account updated successfully"))
}

/// DELETE /api/crm/accounts/:id?forceDelete=true
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> ApiResult<()> {
    let message = state.services.accounts.delete(tenant.tenant_id, id, params.force()).await?;
    Ok(ApiResponse::message(message))
}

/// GET /api/crm/accounts/:id/check-relations
pub async fn check_relations(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AccountRelationCheck> {
    let check = state.services.accounts.check_relations(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(check))
}

/// GET /api/crm/accounts/:id/relationships
pub async fn relations(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AccountRelations> {
    let relations = state.services.accounts.relations(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(relations))
}

/// GET /api/crm/accounts/:id/contacts
pub async fn contacts(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<AccountContactView>> {
    let links = state.services.accounts.contacts(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(links))
}

/// GET /api/crm/accounts/:id/hierarchy
pub async fn hierarchy(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<AccountHierarchy> {
    let hierarchy = state.services.accounts.hierarchy(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(hierarchy))
}

/// GET /api/crm/accounts/pipeline
pub async fn pipeline(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> ApiResult<Vec<AccountPipelineRow>> {
    let rows = state.services.accounts.pipeline(tenant.tenant_id).await?;
    Ok(ApiResponse::success(rows))
}
