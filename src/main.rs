use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crm_api_rust::app::app;
use crm_api_rust::config;
use crm_api_rust::database::DatabaseManager;
use crm_api_rust::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crm_api_rust=info,tower_http=info")),
        )
        .init();

    let config = config::config().clone();
    tracing::info!("Starting CRM API in {:?} mode", config.environment);
    if config.is_production() && config.security.jwt_secret.is_empty() {
        anyhow::bail!("SECURITY_JWT_SECRET (or JWT_SECRET) must be set in production");
    }

    // Lazy so the server comes up (and reports degraded health) while the database is down
    let pool = DatabaseManager::connect_lazy(&config.database).context("database configuration")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::new(config, pool);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("CRM API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server")?;
    Ok(())
}
