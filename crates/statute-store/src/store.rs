//! The statute store: persisted event log plus in-memory projection.
//!
//! Writes go to `SQLite` first and are folded into the projection only once
//! they are durable, so the projection never runs ahead of the log. Reads are
//! served from memory and never touch the database.

use crate::connection::StorePool;
use crate::error::Result;
use crate::event::{Jurisdiction, Statute, StatuteEvent};
use crate::projection::Projection;
use crate::{jurisdictions, migrations, statute_events};
use serde::{Deserialize, Serialize};
use statute_core::JurisdictionId;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{broadcast, Mutex};

const NOTIFICATION_CAPACITY: usize = 256;

/// Change notifications published by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotification {
    /// A jurisdiction was created or refreshed
    Jurisdiction(Jurisdiction),
    /// An event was appended to the log
    Event(StatuteEvent),
    /// A statute's current state changed
    Statute(Statute),
}

/// Envelope returned by [`StatuteStore::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteSearchResult {
    /// Always `"StatuteSearchResult"`
    #[serde(rename = "type")]
    pub kind: String,
    /// The query as received
    pub query: serde_json::Value,
    /// Matches; empty rather than absent when nothing matched
    #[serde(default)]
    pub results: Vec<Statute>,
}

impl StatuteSearchResult {
    fn new(query: serde_json::Value, results: Vec<Statute>) -> Self {
        Self {
            kind: "StatuteSearchResult".to_string(),
            query,
            results,
        }
    }
}

#[derive(Default)]
struct State {
    jurisdictions: BTreeMap<JurisdictionId, Jurisdiction>,
    projection: Projection,
}

/// Event-sourced store of jurisdictions and statutes.
pub struct StatuteStore {
    pool: StorePool,
    state: RwLock<State>,
    write_lock: Mutex<()>,
    notifications: broadcast::Sender<StoreNotification>,
}

impl StatuteStore {
    /// Open the database at `path`, migrate it and replay the log.
    ///
    /// # Errors
    /// Returns `StoreError` if the database cannot be opened, migrated or replayed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_pool(StorePool::open(path).await?).await
    }

    /// Store backed by a private in-memory database.
    ///
    /// # Errors
    /// Returns `StoreError` if the database cannot be created or migrated.
    pub async fn in_memory() -> Result<Self> {
        Self::from_pool(StorePool::in_memory().await?).await
    }

    /// Migrate `pool` and rebuild the projection from its log.
    ///
    /// # Errors
    /// Returns `StoreError` if migration fails or a persisted row cannot be decoded.
    pub async fn from_pool(pool: StorePool) -> Result<Self> {
        migrations::run_migrations(pool.pool()).await?;

        let known = jurisdictions::list(pool.pool()).await?;
        let events = statute_events::load_all(pool.pool()).await?;
        let event_count = events.len();

        let state = State {
            jurisdictions: known.into_iter().map(|j| (j.id.clone(), j)).collect(),
            projection: Projection::replay(events),
        };

        tracing::info!(
            jurisdictions = state.jurisdictions.len(),
            events = event_count,
            statutes = state.projection.all().count(),
            "Statute store loaded"
        );

        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            pool,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
            notifications,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: StoreNotification) {
        // No subscribers is fine.
        let _ = self.notifications.send(notification);
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotification> {
        self.notifications.subscribe()
    }

    /// Create (or refresh) the jurisdiction called `name`.
    ///
    /// The id is derived from the trimmed name, so repeated calls converge on
    /// one record. A notification is published on every call.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for a blank name, or a database error.
    pub async fn create_jurisdiction(&self, name: &str) -> Result<Jurisdiction> {
        let jurisdiction = Jurisdiction::named(name)?;

        let _guard = self.write_lock.lock().await;
        jurisdictions::upsert(self.pool.pool(), &jurisdiction).await?;
        self.write()
            .jurisdictions
            .insert(jurisdiction.id.clone(), jurisdiction.clone());

        tracing::debug!(id = %jurisdiction.id, name = %jurisdiction.name, "Jurisdiction created");
        self.notify(StoreNotification::Jurisdiction(jurisdiction.clone()));
        Ok(jurisdiction)
    }

    /// Append `event` to the log and fold it into the projection.
    ///
    /// Returns the affected statute's new state; `None` if the event did not
    /// establish one (e.g. an amendment with no prior enactment).
    ///
    /// # Errors
    /// Returns `StoreError::Validation` for events without a statute id or
    /// jurisdiction, or a database error. On error nothing is appended.
    pub async fn register_statute_event(&self, event: StatuteEvent) -> Result<Option<Statute>> {
        event.validate()?;

        let _guard = self.write_lock.lock().await;
        statute_events::append(self.pool.pool(), &event).await?;

        tracing::debug!(
            statute = %event.statute.id,
            kind = %event.kind,
            timestamp = %event.timestamp,
            "Registering statute event"
        );

        let updated = self.write().projection.append(event.clone()).cloned();

        self.notify(StoreNotification::Event(event));
        if let Some(statute) = &updated {
            self.notify(StoreNotification::Statute(statute.clone()));
        }
        Ok(updated)
    }

    /// All jurisdictions, ordered by id.
    #[must_use]
    pub fn enumerate_jurisdictions(&self) -> Vec<Jurisdiction> {
        self.read().jurisdictions.values().cloned().collect()
    }

    #[must_use]
    pub fn jurisdiction_by_name(&self, name: &str) -> Option<Jurisdiction> {
        let id = JurisdictionId::from_name(name.trim()).ok()?;
        self.read().jurisdictions.get(&id).cloned()
    }

    /// The event log in timestamp order.
    #[must_use]
    pub fn enumerate_statute_events(&self) -> Vec<StatuteEvent> {
        self.read().projection.events().to_vec()
    }

    /// Active statutes, ordered by id.
    #[must_use]
    pub fn list_current_statutes(&self) -> Vec<Statute> {
        self.read().projection.current().cloned().collect()
    }

    /// Every projected statute, repealed ones included.
    #[must_use]
    pub fn enumerate_statutes(&self) -> Vec<Statute> {
        self.read().projection.all().cloned().collect()
    }

    /// Current state of one statute, repealed or not.
    #[must_use]
    pub fn statute(&self, id: &str) -> Option<Statute> {
        self.read().projection.statute(id).cloned()
    }

    #[must_use]
    pub fn statutes_by_jurisdiction_name(&self, name: &str) -> Vec<Statute> {
        self.read()
            .projection
            .current()
            .filter(|s| s.jurisdiction() == name)
            .cloned()
            .collect()
    }

    /// Search envelope for `query`.
    ///
    /// Only a `{"jurisdiction": <name>}` filter is understood; anything else
    /// yields an empty result list.
    #[must_use]
    pub fn search(&self, query: serde_json::Value) -> StatuteSearchResult {
        let results = query
            .get("jurisdiction")
            .and_then(serde_json::Value::as_str)
            .map(|name| self.statutes_by_jurisdiction_name(name))
            .unwrap_or_default();

        StatuteSearchResult::new(query, results)
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
