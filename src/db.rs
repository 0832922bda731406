//! Database module
//!
//! Pool construction, connectivity and schema utilities.

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};

use crate::config::Config;

/// Bundled schema, idempotent
pub const SCHEMA_SQL: &str = include_str!("../migrations/0001_ledger.sql");

/// Tables the ledger reads and writes
pub const REQUIRED_TABLES: [&str; 6] = [
    "users",
    "accounts",
    "transactions",
    "bills",
    "positions",
    "trades",
];

/// Build the connection pool from configuration
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.database_acquire_timeout)
        .connect(&config.database_url)
        .await
}

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Apply the bundled schema
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Raw string execution allows the multi-statement script
    pool.execute(SCHEMA_SQL).await?;

    tracing::info!("Schema applied");
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let trigger_present: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_trigger WHERE tgname = 'transactions_immutable')",
    )
    .fetch_one(pool)
    .await?;

    if !trigger_present {
        tracing::error!("Trigger 'transactions_immutable' is missing; transactions are mutable");
        return Ok(false);
    }

    Ok(true)
}
