//! Statute event log table operations.

use crate::error::{Result, StoreError};
use crate::event::{StatuteEvent, StatuteEventKind, StatuteRecord};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// Append one event to the log.
///
/// # Errors
/// Returns an error if the record cannot be serialized or the insert fails.
pub async fn append(pool: &Pool<Sqlite>, event: &StatuteEvent) -> Result<()> {
    let statute = serde_json::to_string(&event.statute)
        .map_err(|e| StoreError::Decode(format!("unserializable statute record: {e}")))?;

    sqlx::query(
        "INSERT INTO statute_events (kind, statute_id, jurisdiction, statute, timestamp, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event.kind.as_str())
    .bind(&event.statute.id)
    .bind(&event.statute.jurisdiction)
    .bind(&statute)
    .bind(event.timestamp.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Every event in append order.
///
/// # Errors
/// Returns `StoreError::Decode` if a row holds an unknown kind, a malformed
/// record or an unparseable timestamp.
pub async fn load_all(pool: &Pool<Sqlite>) -> Result<Vec<StatuteEvent>> {
    let rows = sqlx::query("SELECT seq, kind, statute, timestamp FROM statute_events ORDER BY seq")
        .fetch_all(pool)
        .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let seq: i64 = row.try_get("seq")?;
        let kind: String = row.try_get("kind")?;
        let statute: String = row.try_get("statute")?;
        let timestamp: String = row.try_get("timestamp")?;

        let statute: StatuteRecord = serde_json::from_str(&statute)
            .map_err(|e| StoreError::Decode(format!("event {seq}: malformed statute record: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| StoreError::Decode(format!("event {seq}: bad timestamp '{timestamp}': {e}")))?
            .with_timezone(&Utc);

        events.push(StatuteEvent {
            kind: StatuteEventKind::parse(&kind)?,
            statute,
            timestamp,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StorePool;
    use crate::migrations::run_migrations;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_append_and_load_preserves_order() {
        let pool = StorePool::in_memory().await.unwrap();
        run_migrations(pool.pool()).await.unwrap();

        let late = StatuteEvent::enactment(
            StatuteRecord::new("a", "Ohio", "late").with_content("text"),
            Utc.timestamp_opt(2_000, 0).unwrap(),
        );
        let early = StatuteEvent::repeal(
            StatuteRecord::new("b", "Ohio", "early"),
            Utc.timestamp_opt(1_000, 0).unwrap(),
        );
        append(pool.pool(), &late).await.unwrap();
        append(pool.pool(), &early).await.unwrap();

        let loaded = load_all(pool.pool()).await.unwrap();
        assert_eq!(loaded, vec![late, early]);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected_by_schema() {
        let pool = StorePool::in_memory().await.unwrap();
        run_migrations(pool.pool()).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO statute_events (kind, statute_id, jurisdiction, statute, timestamp, recorded_at)
             VALUES ('codification', 'a', 'Ohio', '{}', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .execute(pool.pool())
        .await;

        assert!(result.is_err());
    }
}
