//! Statute Store
//!
//! Event-sourced storage for the statute corpus: an append-only log of
//! statute events persisted in `SQLite`, and a current-state projection of
//! jurisdictions and statutes derived from it.
//!
//! # Architecture
//!
//! - **Log**: every `enactment`, `amendment` and `repeal` is appended to the
//!   `statute_events` table and never rewritten
//! - **Projection**: an in-memory fold of the log, kept sorted by event
//!   timestamp and rebuilt by replay when the store is opened
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//!
//! # Example
//!
//! ```ignore
//! use statute_store::{StatuteEvent, StatuteRecord, StatuteStore};
//!
//! let store = StatuteStore::open("corpus/events.db").await?;
//! store.create_jurisdiction("Colorado").await?;
//! store
//!     .register_statute_event(StatuteEvent::enactment(
//!         StatuteRecord::new("CO-18-1-101", "Colorado", "Short title"),
//!         chrono::Utc::now(),
//!     ))
//!     .await?;
//! assert_eq!(store.statutes_by_jurisdiction_name("Colorado").len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
#[allow(missing_docs)]
pub mod event;
pub mod jurisdictions;
pub mod migrations;
#[allow(missing_docs)]
pub mod projection;
pub mod statute_events;
#[allow(missing_docs)]
pub mod store;

// Re-export commonly used types
pub use connection::StorePool;
pub use error::{Result, StoreError};
pub use event::{
    Jurisdiction, Statute, StatuteEvent, StatuteEventKind, StatuteRecord, StatuteStatus,
};
pub use projection::Projection;
pub use store::{StatuteSearchResult, StatuteStore, StoreNotification};
