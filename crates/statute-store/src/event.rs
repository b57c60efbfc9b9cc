//! Statute events and the records they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statute_core::JurisdictionId;
use std::fmt;

use crate::error::{Result, StoreError};

/// A jurisdiction known to the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// Id derived from the name
    pub id: JurisdictionId,
    /// Display name, e.g. "Colorado"
    pub name: String,
}

impl Jurisdiction {
    /// Build a jurisdiction for `name`, deriving its id.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the name is blank.
    pub fn named(name: &str) -> Result<Self> {
        let name = name.trim();
        Ok(Self {
            id: JurisdictionId::from_name(name)?,
            name: name.to_string(),
        })
    }
}

/// What happened to a statute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatuteEventKind {
    /// First publication (or re-publication) of a statute
    Enactment,
    /// Replacement text for an enacted statute
    Amendment,
    /// Withdrawal of a statute
    Repeal,
}

impl StatuteEventKind {
    /// Wire name as stored in the event log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enactment => "enactment",
            Self::Amendment => "amendment",
            Self::Repeal => "repeal",
        }
    }

    /// Parse the wire name.
    ///
    /// # Errors
    /// Returns `StoreError::Decode` for unknown kinds.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "enactment" => Ok(Self::Enactment),
            "amendment" => Ok(Self::Amendment),
            "repeal" => Ok(Self::Repeal),
            other => Err(StoreError::Decode(format!("unknown event kind '{other}'"))),
        }
    }
}

impl fmt::Display for StatuteEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The statute payload an event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteRecord {
    /// Stable statute id chosen by the driver (e.g. "CO-18-1-101")
    pub id: String,
    /// Name of the owning jurisdiction
    pub jurisdiction: String,
    /// Human-readable title
    pub title: String,
    /// Statute text, when captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Where the text was acquired from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl StatuteRecord {
    /// Record with id, jurisdiction and title.
    pub fn new(
        id: impl Into<String>,
        jurisdiction: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            jurisdiction: jurisdiction.into(),
            title: title.into(),
            content: None,
            source_url: None,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// One immutable entry in the statute event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatuteEvent {
    /// Event type
    #[serde(rename = "type")]
    pub kind: StatuteEventKind,
    /// Statute the event applies to
    pub statute: StatuteRecord,
    /// When the event took effect; the log is ordered by this
    pub timestamp: DateTime<Utc>,
}

impl StatuteEvent {
    pub fn new(kind: StatuteEventKind, statute: StatuteRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            statute,
            timestamp,
        }
    }

    pub fn enactment(statute: StatuteRecord, timestamp: DateTime<Utc>) -> Self {
        Self::new(StatuteEventKind::Enactment, statute, timestamp)
    }

    pub fn amendment(statute: StatuteRecord, timestamp: DateTime<Utc>) -> Self {
        Self::new(StatuteEventKind::Amendment, statute, timestamp)
    }

    pub fn repeal(statute: StatuteRecord, timestamp: DateTime<Utc>) -> Self {
        Self::new(StatuteEventKind::Repeal, statute, timestamp)
    }

    /// Reject events the projection cannot key.
    ///
    /// # Errors
    /// Returns `StoreError::Validation` if the statute id or jurisdiction is blank.
    pub fn validate(&self) -> Result<()> {
        if self.statute.id.trim().is_empty() {
            return Err(StoreError::Validation(
                "statute event must carry a statute id".to_string(),
            ));
        }
        if self.statute.jurisdiction.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "statute {} has no jurisdiction",
                self.statute.id
            )));
        }
        Ok(())
    }
}

/// Lifecycle state of a statute in the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatuteStatus {
    /// In force
    Active,
    /// Repealed; kept for history but not listed as current
    Repealed,
}

/// Current state of one statute, derived from its events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statute {
    /// Latest text and metadata
    #[serde(flatten)]
    pub record: StatuteRecord,
    pub status: StatuteStatus,
    /// Number of events folded into this state
    pub revision: u32,
    /// Timestamp of the first enactment
    pub enacted_at: DateTime<Utc>,
    /// Timestamp of the last applied event
    pub updated_at: DateTime<Utc>,
}

impl Statute {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    #[must_use]
    pub fn jurisdiction(&self) -> &str {
        &self.record.jurisdiction
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == StatuteStatus::Active
    }
}
