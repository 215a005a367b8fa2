use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::env;
use std::str::FromStr;

pub mod models;
pub mod receipts;

pub type DbPool = SqlitePool;

pub async fn init_pool() -> anyhow::Result<DbPool> {
    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://receipts.db".to_string());

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    Ok(pool)
}

/// Executes a migration script statement by statement. The sqlite driver does
/// not run multiple statements in one call, so split on semicolons.
pub async fn apply_sql(pool: &DbPool, sql: &str) -> anyhow::Result<()> {
    let statements = sql
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    for stmt in statements {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Migration statement failed: {}", e))?;
    }

    Ok(())
}

/// Applies the baseline schema. Idempotent; safe to run at every startup.
pub async fn migrate(pool: &DbPool) -> anyhow::Result<()> {
    apply_sql(pool, include_str!("../../migrations/init.sql")).await
}
