//! Jurisdiction table operations.

use crate::error::Result;
use crate::event::Jurisdiction;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use statute_core::JurisdictionId;

/// Insert a jurisdiction, or refresh its name and `updated_at` if the id exists.
///
/// # Errors
/// Returns `sqlx::Error` if the upsert fails.
pub async fn upsert(pool: &Pool<Sqlite>, jurisdiction: &Jurisdiction) -> Result<()> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO jurisdictions (id, name, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
    )
    .bind(jurisdiction.id.as_str())
    .bind(&jurisdiction.name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// All jurisdictions, ordered by name.
///
/// # Errors
/// Returns an error if the query fails or a row carries an empty id.
pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Jurisdiction>> {
    let rows = sqlx::query("SELECT id, name FROM jurisdictions ORDER BY name")
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| -> Result<Jurisdiction> {
            let id: String = row.try_get("id")?;
            Ok(Jurisdiction {
                id: JurisdictionId::new(id)?,
                name: row.try_get("name")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StorePool;
    use crate::migrations::run_migrations;

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let pool = StorePool::in_memory().await.unwrap();
        run_migrations(pool.pool()).await.unwrap();

        let colorado = Jurisdiction::named("Colorado").unwrap();
        upsert(pool.pool(), &colorado).await.unwrap();
        upsert(pool.pool(), &colorado).await.unwrap();
        upsert(pool.pool(), &Jurisdiction::named("Arkansas").unwrap())
            .await
            .unwrap();

        let names: Vec<String> = list(pool.pool())
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, vec!["Arkansas", "Colorado"]);
    }
}
