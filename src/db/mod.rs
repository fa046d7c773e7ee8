pub mod queries;
pub mod store;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::AppConfig;

/// Connection pool sized so every batch worker can write at once, with a
/// little headroom for page reads and the operator API.
pub async fn init_pool(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
    let max_connections = u32::try_from(config.pool_max_size).unwrap_or(u32::MAX).saturating_add(4);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
}

/// Apply pending migrations from `./migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}
