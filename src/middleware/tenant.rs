use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::services::TenantSource;
use crate::state::AppState;

/// Resolves the tenant once per request and inserts `TenantContext`.
///
/// The body is buffered to look for `tenantId` and then handed on
/// unchanged, so handlers can still extract `Json<...>`. Must run after
/// [`super::jwt_auth_middleware`] for the user fallback to apply.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let limit = state.config.api.max_request_size_bytes;
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::PayloadTooLarge(format!("Request body exceeds {} bytes", limit)))?;

    let source = TenantSource {
        body_tenant_id: body_tenant_id(&bytes),
        query_company: query_company(parts.uri.query()),
        user_company_id: parts.extensions.get::<AuthUser>().and_then(|user| user.company_id),
    };

    let context = state.services.resolver.resolve(&source).await.inspect_err(|e| {
        tracing::debug!(path = %parts.uri.path(), error = %e, "Tenant resolution failed");
    })?;
    parts.extensions.insert(context);

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// `tenantId` of a JSON object body; anything unparsable counts as absent
fn body_tenant_id(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(mut map)) => map.remove("tenantId"),
        _ => None,
    }
}

fn query_company(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "company")
        .map(|(_, value)| value.into_owned())
}
