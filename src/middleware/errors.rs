use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use crate::error::InternalErrorDetail;
use crate::state::AppState;

/// Outermost layer. A 500 leaves the handler with the generic message;
/// only apps configured with `api.expose_internal_errors` get the raw text.
pub async fn expose_internal_errors_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(InternalErrorDetail(detail)) = response.extensions_mut().remove::<InternalErrorDetail>() else {
        return response;
    };
    if !state.config.api.expose_internal_errors {
        return response;
    }
    (response.status(), Json(detail)).into_response()
}
