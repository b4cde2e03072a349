//! Application state shared across handlers

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};

use crate::{
    auth::AuthManager, db::TerminologyRepository, services::ImportService, Config,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub auth: AuthManager,
    pub terminology: TerminologyRepository,
    pub import: ImportService,
}

#[derive(Debug, Clone, Copy)]
pub struct AppStateOptions {
    pub run_migrations: bool,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
        }
    }
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_options(config, AppStateOptions::default()).await
    }

    pub async fn new_with_options(
        config: Config,
        options: AppStateOptions,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.database.pool_min_size)
            .max_connections(config.database.pool_max_size)
            .acquire_timeout(Duration::from_secs(config.database.pool_timeout_seconds))
            .connect(&config.database.url)
            .await?;

        if options.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        let config = Arc::new(config);
        let terminology = TerminologyRepository::new(pool.clone());
        let import = ImportService::new(terminology.clone(), config.import.max_batch);

        Ok(Self {
            auth: AuthManager::new(config.clone()),
            config,
            db_pool: pool,
            terminology,
            import,
        })
    }
}
