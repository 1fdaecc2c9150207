use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, crm};
use crate::middleware::{expose_internal_errors_middleware, jwt_auth_middleware, resolve_tenant_middleware};
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors_origins);

    let router = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Protected CRM API
        .nest("/api/crm", crm_routes(state.clone()))
        // Global middleware
        .layer(from_fn_with_state(state.clone(), expose_internal_errors_middleware))
        .layer(cors);

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

/// `/api/crm/*`. Route layers run bottom-up: auth first, then tenant resolution.
fn crm_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(account_routes())
        .merge(contact_routes())
        .merge(opportunity_routes())
        .merge(setup_routes())
        .merge(reporting_routes())
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn account_routes() -> Router<AppState> {
    use crm::{accounts, relationship_types, relationships};

    Router::new()
        .route("/accounts", get(accounts::list).post(accounts::post))
        .route("/accounts/search", post(accounts::search))
        .route("/accounts/pipeline", get(accounts::pipeline))
        .route("/accounts/:id", get(accounts::get).put(accounts::put).delete(accounts::delete))
        .route("/accounts/:id/check-relations", get(accounts::check_relations))
        .route("/accounts/:id/relationships", get(accounts::relations))
        .route("/accounts/:id/contacts", get(accounts::contacts))
        .route("/accounts/:id/hierarchy", get(accounts::hierarchy))
        .route("/relationships", get(relationships::list).post(relationships::post))
        .route("/relationships/hierarchy/:account_id", get(relationships::hierarchy))
        .route(
            "/relationships/:id",
            get(relationships::get).put(relationships::put).delete(relationships::delete),
        )
        .route("/relationship-types", get(relationship_types::list).post(relationship_types::post))
        .route("/relationship-types/entity-combinations", get(relationship_types::combinations))
        .route("/relationship-types/sort-order", put(relationship_types::sort_order))
        .route("/relationship-types/bulk-update", put(relationship_types::bulk_update))
        .route(
            "/relationship-types/:name",
            get(relationship_types::get).put(relationship_types::put).delete(relationship_types::delete),
        )
        .route("/relationship-types/:name/stats", get(relationship_types::stats))
}

fn contact_routes() -> Router<AppState> {
    use crm::{account_contacts, contacts};

    Router::new()
        .route("/contacts", get(contacts::list).post(contacts::post))
        .route("/contacts/search", post(contacts::search))
        .route("/contacts/accounts", get(account_contacts::list).post(account_contacts::post))
        .route("/contacts/accounts/:id", put(account_contacts::put).delete(account_contacts::delete))
        .route("/contacts/:id", get(contacts::get).put(contacts::put).delete(contacts::delete))
        .route("/contacts/:id/relationships", get(contacts::relations))
        .route("/contacts/:id/stats", get(contacts::stats))
        .route("/contacts/:id/accounts", get(contacts::accounts))
        .route("/contacts/:id/opportunities", get(contacts::opportunities))
}

fn opportunity_routes() -> Router<AppState> {
    use crm::{opportunities, opportunity_contacts};

    Router::new()
        .route("/opportunities", get(opportunities::list).post(opportunities::post))
        .route("/opportunities/search", post(opportunities::search))
        .route("/opportunities/pipeline", get(opportunities::pipeline))
        .route(
            "/opportunities/contacts",
            get(opportunity_contacts::list).post(opportunity_contacts::post),
        )
        .route(
            "/opportunities/contacts/:id",
            put(opportunity_contacts::put).delete(opportunity_contacts::delete),
        )
        .route("/opportunities/stage-history/:id", put(opportunities::move_stage))
        .route(
            "/opportunities/:id",
            get(opportunities::get).put(opportunities::put).delete(opportunities::delete),
        )
        .route("/opportunities/:id/check-relations", get(opportunities::check_relations))
        .route("/opportunities/:id/relationships", get(opportunities::relations))
        .route("/opportunities/:id/contacts", get(opportunities::contacts))
        .route("/opportunities/:id/stage-history", get(opportunities::stage_history))
        .route("/opportunities/:id/stage-history-details", get(opportunities::stage_history_details))
}

fn setup_routes() -> Router<AppState> {
    use crm::{custom_fields, stages, tenant};

    Router::new()
        .route("/stages", get(stages::list).post(stages::post))
        .route("/stages/reorder", put(stages::reorder))
        .route("/stages/:id", get(stages::get).put(stages::put).delete(stages::delete))
        .route("/custom-fields", get(custom_fields::list).post(custom_fields::post))
        .route("/custom-fields/schema/:table_name", get(custom_fields::schema))
        .route(
            "/custom-fields/:id",
            get(custom_fields::get).put(custom_fields::put).delete(custom_fields::delete),
        )
        .route("/tenant", get(tenant::get).put(tenant::put))
        .route("/tenant/settings", get(tenant::settings).put(tenant::put_settings))
        .route("/tenant/dashboard", get(tenant::dashboard))
}

fn reporting_routes() -> Router<AppState> {
    use crm::{dashboard, search};

    Router::new()
        .route("/search", get(search::global))
        .route("/search/:entity_type", post(search::entity))
        .route("/dashboard/opportunities", get(dashboard::opportunities))
        .route("/dashboard/pipeline", get(dashboard::pipeline))
}

/// `*` allows any origin; otherwise only the listed ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
