//! `SQLite` connection management.
//!
//! Provides a `StorePool` wrapper around the `SQLx` pool that knows how to
//! open either a file-backed database or a private in-memory one.

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Connection pool for the statute database.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: Pool<Sqlite>,
}

impl StorePool {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// Parent directories are created first. File databases run in WAL mode
    /// with foreign keys enforced.
    ///
    /// # Errors
    /// Returns `StoreError::Open` if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;

        tracing::info!("Statute database opened at {}", path.display());
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    ///
    /// Every `SQLite` connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    ///
    /// # Errors
    /// Returns `StoreError::Open` if the database cannot be created.
    pub async fn in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(":memory:")
            .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Open(format!(":memory:: {e}")))?;

        Ok(Self { pool })
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool, waiting for connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Statute database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = StorePool::in_memory().await.expect("open in-memory pool");
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(pool.pool())
            .await
            .expect("query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("events.db");

        let pool = StorePool::open(&path).await.expect("open file pool");
        pool.close().await;

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_pool_uses_wal_and_foreign_keys() {
        let tmp = TempDir::new().unwrap();
        let pool = StorePool::open(tmp.path().join("events.db"))
            .await
            .expect("open file pool");

        let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(pool.pool())
            .await
            .expect("journal mode");
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(pool.pool())
            .await
            .expect("foreign keys");

        assert_eq!(journal, "wal");
        assert_eq!(foreign_keys, 1);
        pool.close().await;
    }
}
