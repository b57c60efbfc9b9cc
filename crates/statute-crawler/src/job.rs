//! Crawl jobs, queue identity and session serialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A driver's traversal state. Each driver defines an enum and dispatches on
/// it with `match`; the orchestrator never interprets labels.
pub trait RequestLabel: Clone + fmt::Debug + Send + Sync + 'static {
    /// Label of the seed job.
    fn start() -> Self;
}

/// Which fetch engine runs a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// HTTP fetch plus markup parsing
    Markup,
    /// Full browser automation
    Browser,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markup => f.write_str("markup"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

/// Data carried from a handler to the jobs it enqueues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// Path segments accumulated while descending the hierarchy
    pub path: Vec<String>,
    /// Free-form values
    pub attributes: HashMap<String, String>,
}

/// A labeled request.
#[derive(Debug, Clone)]
pub struct CrawlJob<L> {
    pub url: String,
    pub label: L,
    pub user_data: UserData,
    engine: Option<EngineKind>,
}

impl<L: RequestLabel> CrawlJob<L> {
    pub fn new(url: impl Into<String>, label: L) -> Self {
        Self {
            url: url.into(),
            label,
            user_data: UserData::default(),
            engine: None,
        }
    }

    /// Seed job for a run.
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, L::start())
    }

    #[must_use]
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_data.path = path.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_data.attributes.insert(key.into(), value.into());
        self
    }

    /// Successor job that inherits this job's path plus `segment`.
    pub fn child(&self, url: impl Into<String>, label: L, segment: impl Into<String>) -> Self {
        let mut user_data = self.user_data.clone();
        user_data.path.push(segment.into());
        Self {
            url: url.into(),
            label,
            user_data,
            engine: None,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.user_data.attributes.get(key).map(String::as_str)
    }

    /// Engine the job was dispatched to; `None` until enqueued.
    pub fn engine(&self) -> Option<EngineKind> {
        self.engine
    }

    pub(crate) fn stamped(mut self, engine: EngineKind) -> Self {
        self.engine = Some(engine);
        self
    }
}

/// Identity of a job queue.
///
/// Runs on the shared queue of an engine kind are mutually exclusive for the
/// browser engine; isolated handles give a run its own queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    id: String,
    kind: EngineKind,
    isolated: bool,
}

impl QueueHandle {
    /// The shared queue of an engine kind.
    pub fn shared(kind: EngineKind) -> Self {
        Self {
            id: format!("{kind}-default"),
            kind,
            isolated: false,
        }
    }

    /// A fresh queue nobody else uses.
    pub fn isolated(kind: EngineKind) -> Self {
        Self {
            id: format!("{kind}-{}", uuid::Uuid::new_v4()),
            kind,
            isolated: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }
}

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A driver-owned lock serializing browser sessions.
///
/// Hand a clone to each run that must not overlap with the others; the
/// orchestrator holds the guard for the whole run and drops it on every
/// exit path.
#[derive(Debug, Clone, Default)]
pub struct SessionLock(Arc<Mutex<()>>);

impl SessionLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> SessionGuard {
        SessionGuard(Arc::clone(&self.0).lock_owned().await)
    }

    pub fn is_held(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// Held while a serialized session runs.
#[derive(Debug)]
pub struct SessionGuard(#[allow(dead_code)] OwnedMutexGuard<()>);
