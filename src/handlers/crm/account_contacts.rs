use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{AccountContact, AccountContactFilters, AccountContactPatch, AccountContactView, NewAccountContact};
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantContext;
use crate::state::AppState;

/// POST /api/crm/contacts/accounts - Link a contact to an account
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<NewAccountContact>,
) -> ApiResult<AccountContact> {
    let link = state.services.account_contacts.create(tenant.tenant_id, body).await?;
    Ok(ApiResponse::created(link).with_message("Contact associated with account successfully"))
}

/// GET /api/crm/contacts/accounts?account_id&contact_id
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(filters): ApiQuery<AccountContactFilters>,
) -> ApiResult<Vec<AccountContactView>> {
    Ok(ApiResponse::success(state.services.account_contacts.list(tenant.tenant_id, &filters).await?))
}

/// PUT /api/crm/contacts/accounts/:id
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<AccountContactPatch>,
) -> ApiResult<AccountContact> {
    let link = state.services.account_contacts.update(tenant.tenant_id, id, &patch).await?;
    Ok(ApiResponse::success(link).with_message("Account contact relationship updated successfully"))
}

/// DELETE /api/crm/contacts/accounts/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.services.account_contacts.delete(tenant.tenant_id, id).await?;
    Ok(ApiResponse::message("Account contact relationship deleted successfully"))
}
