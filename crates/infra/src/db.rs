//! Database pool lifecycle and schema bootstrap.
//!
//! The pool is process state: built once at startup, shared behind `Arc` by
//! every Postgres store, and closed on shutdown.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use crate::error::{StoreError, map_sqlx_error};

const SCHEMA: &str = include_str!("schema.sql");

/// Connect to Postgres and run the schema bootstrap.
#[instrument(skip(database_url), err)]
pub async fn connect(database_url: &str, max_connections: u32) -> Result<Arc<PgPool>, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    bootstrap_schema(&pool).await?;
    info!(max_connections, "database pool ready");
    Ok(Arc::new(pool))
}

/// Create tables, indexes and lookup seeds if they do not exist.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("bootstrap_schema", e))?;
    Ok(())
}

/// Close the pool, waiting for checked-out connections to be returned.
pub async fn close(pool: &PgPool) {
    pool.close().await;
    info!("database pool closed");
}
