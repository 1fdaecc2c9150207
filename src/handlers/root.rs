use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::database::DatabaseManager;
use crate::state::AppState;

/// GET / - Service name, version and endpoint map
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "name": "CRM API (Rust)",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant CRM API",
            "endpoints": {
                "health": "/health",
                "accounts": "/api/crm/accounts",
                "contacts": "/api/crm/contacts",
                "account_contacts": "/api/crm/contacts/accounts",
                "opportunities": "/api/crm/opportunities",
                "opportunity_contacts": "/api/crm/opportunities/contacts",
                "stages": "/api/crm/stages",
                "custom_fields": "/api/crm/custom-fields",
                "relationships": "/api/crm/relationships",
                "search": "/api/crm/search",
                "tenant": "/api/crm/tenant",
                "dashboard": "/api/crm/dashboard"
            }
        }
    }))
}

/// GET /health - 503 when the database does not answer
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok", "database": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unavailable" })),
            )
        }
    }
}
