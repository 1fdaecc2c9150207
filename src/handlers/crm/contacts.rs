use axum::extract::{Extension, State};
use uuid::Uuid;

use crate::database::models::{
    AccountContactView, Contact, ContactFilters, ContactPatch, ContactRelations, ContactSearchFilters,
    ContactStats, ContactSummary, NewContact, OpportunityContactView, SearchRequest,
};
use crate::database::PageParams;
use crate::handlers::extract::{ApiJson, ApiPath, ApiQuery, DeleteParams};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::TenantContext;
use crate::state::AppState;

/// GET /api/crm/contacts
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiQuery(page): ApiQuery<PageParams>,
    ApiQuery(filters): ApiQuery<ContactFilters>,
) -> ApiResult<Vec<ContactSummary>> {
    Ok(state.services.contacts.list(tenant.tenant_id, &filters, &page).await?.into())
}

/// POST /api/crm/contacts/search
pub async fn search(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiJson(body): ApiJson<SearchRequest<ContactSearchFilters>>,
) -> ApiResult<Vec<Contact>> {
    Ok(state.services.contacts.search(tenant.tenant_id, &body).await?.into())
}

/// GET /api/crm/contacts/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Contact> {
    let contact = state.services.contacts.get(tenant.tenant_id, id).await?;
    Ok(ApiResponse::success(contact))
}

/// POST /api/crm/contacts
pub async fn post(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewContact>,
) -> ApiResult<Contact> {
    let contact = state.services.contacts.create(tenant.tenant_id, Some(user.id), body).await?;
    Ok(ApiResponse::created(contact).with_message("Contact created successfully"))
}

/// PUT /api/crm/contacts/:id
pub async fn put(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ContactPatch>,
) -> ApiResult<Contact> {
    let contact = state.services.contacts.update(tenant.tenant_id, id, Some(user.id), &patch).await?;
    Ok(ApiResponse::success(contact).with_message("Contact updated successfully"))
}

/// DELETE /api/crm/contacts/:id?forceDelete=true
pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeleteParams>,
) -> ApiResult<()> {
    let message = state.services.contacts.delete(tenant.tenant_id, id, params.force()).await?;
    Ok(ApiResponse::message(message))
}

/// GET /api/crm/contacts/:id/relationships
pub async fn relations(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ContactRelations> {
    Ok(ApiResponse::success(state.services.contacts.relations(tenant.tenant_id, id).await?))
}

/// GET /api/crm/contacts/:id/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ContactStats> {
    Ok(ApiResponse::success(state.services.contacts.stats(tenant.tenant_id, id).await?))
}

/// GET /api/crm/contacts/:id/accounts
pub async fn accounts(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<AccountContactView>> {
    Ok(ApiResponse::success(state.services.contacts.accounts(tenant.tenant_id, id).await?))
}

/// GET /api/crm/contacts/:id/opportunities
pub async fn opportunities(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<OpportunityContactView>> {
    Ok(ApiResponse::success(state.services.contacts.opportunities(tenant.tenant_id, id).await?))
}
