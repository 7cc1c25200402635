//! Database pool construction.
//!
//! Store round-trips must be bounded: the pool caps connection acquisition
//! and every connection gets a server-side statement timeout, so a slow
//! store call surfaces as a transient `StoreUnavailable` instead of
//! stalling unrelated requests.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use std::time::Duration;

use crate::error::AuthResult;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const STATEMENT_TIMEOUT_MS: u32 = 5_000;

/// Connect a bounded Postgres pool.
pub async fn connect(database_url: &str) -> AuthResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {STATEMENT_TIMEOUT_MS}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the embedded migrations.
pub async fn migrate(pool: &PgPool) -> AuthResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    Ok(())
}
