use once_cell::sync::OnceCell;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config;

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

// One pool for the whole process, opened at startup
static POOL: OnceCell<PgPool> = OnceCell::new();

/// Open the connection pool from DATABASE_URL and run pending migrations.
/// Called once from `main` before the server starts accepting requests.
pub async fn init() -> Result<(), DatabaseError> {
    let url = std::env::var("DATABASE_URL").map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
    let settings = &config::config().database;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.connection_timeout_secs))
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    // A second init is a programming error, not a runtime condition
    if POOL.set(pool).is_err() {
        return Err(DatabaseError::Migration("database already initialized".to_string()));
    }

    info!("Database pool ready ({} max connections)", settings.max_connections);
    Ok(())
}

/// Borrow the process-wide pool. Panics when called before `init`, which
/// only happens if the startup sequence is wrong.
pub fn pool() -> &'static PgPool {
    POOL.get().expect("database::init must run before handlers")
}

/// Non-panicking accessor for paths that must answer even when the pool
/// never came up, such as the health endpoint.
pub fn try_pool() -> Option<&'static PgPool> {
    POOL.get()
}

/// Ping the pool to confirm connectivity
pub async fn health_check() -> Result<(), DatabaseError> {
    let pool = try_pool().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
