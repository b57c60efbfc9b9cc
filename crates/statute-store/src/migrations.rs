//! Database migration management.
//!
//! Migrations live in `migrations/` and are embedded at compile time.

use crate::error::{Result, StoreError};
use sqlx::{Pool, Sqlite};

/// Apply every pending migration.
///
/// # Errors
/// Returns `StoreError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::debug!("Running statute database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("migration execution failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StorePool;

    async fn applied(pool: &Pool<Sqlite>) -> Vec<i64> {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations ORDER BY version")
            .fetch_all(pool)
            .await
            .expect("query applied migrations")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = StorePool::in_memory().await.expect("open pool");

        run_migrations(pool.pool()).await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(pool.pool())
        .await
        .expect("query tables");

        assert_eq!(tables, vec!["jurisdictions", "statute_events"]);
        assert_eq!(applied(pool.pool()).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = StorePool::in_memory().await.expect("open pool");

        run_migrations(pool.pool()).await.expect("first run");
        run_migrations(pool.pool()).await.expect("second run");

        assert_eq!(applied(pool.pool()).await, vec![1, 2]);
    }
}
