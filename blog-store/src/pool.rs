use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

use crate::StoreError;

/// Builds the process-wide MySQL connection pool. `pool_size` and
/// `max_overflow` mirror the two knobs the spec exposes; sqlx has a single
/// `max_connections` ceiling, so we combine them.
pub async fn connect(dsn: &str, pool_size: u32, max_overflow: u32) -> Result<MySqlPool, StoreError> {
    MySqlPoolOptions::new()
        .max_connections(pool_size + max_overflow)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(10))
        .connect(dsn)
        .await
        .map_err(StoreError::Connect)
}

pub async fn run_migrations(pool: &MySqlPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(StoreError::Migrate)
}
