use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::repository::Repositories;
use crate::services::Services;

/// Shared by every handler and middleware through axum's `State`
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
    pub pool: PgPool,
}

impl AppState {
    /// Production wiring: every repository backed by `pool`
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let repos = Repositories::postgres(pool.clone());
        Self::with_repositories(config, pool, &repos)
    }

    pub fn with_repositories(config: AppConfig, pool: PgPool, repos: &Repositories) -> Self {
        let services = Services::new(repos, &config.pagination);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            pool,
        }
    }
}
