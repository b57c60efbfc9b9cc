//! Current-state projection of the statute event log.
//!
//! The projection for a statute id is always the fold of every event for that
//! id in timestamp order. Events with equal timestamps keep their append order.
//!
//! Folding rules:
//! - `enactment` replaces the statute and marks it active. Re-enacting a
//!   repealed statute reactivates it.
//! - `amendment` supersedes the text of an active statute. Amendments with no
//!   prior enactment, or against a repealed statute, are ignored.
//! - `repeal` marks an enacted statute repealed and keeps its last text.
//!   A repeal with no prior enactment is ignored.

use crate::event::{Statute, StatuteEvent, StatuteEventKind, StatuteStatus};
use std::collections::BTreeMap;

/// Fold `events` (already in timestamp order) into the statute's current state.
///
/// Returns `None` when no event established the statute.
pub fn fold<'a, I>(events: I) -> Option<Statute>
where
    I: IntoIterator<Item = &'a StatuteEvent>,
{
    let mut current: Option<Statute> = None;

    for event in events {
        match (event.kind, current.as_mut()) {
            (StatuteEventKind::Enactment, Some(statute)) => {
                statute.record = event.statute.clone();
                statute.status = StatuteStatus::Active;
                statute.revision += 1;
                statute.updated_at = event.timestamp;
            }
            (StatuteEventKind::Enactment, None) => {
                current = Some(Statute {
                    record: event.statute.clone(),
                    status: StatuteStatus::Active,
                    revision: 1,
                    enacted_at: event.timestamp,
                    updated_at: event.timestamp,
                });
            }
            (StatuteEventKind::Amendment, Some(statute)) if statute.is_active() => {
                statute.record = event.statute.clone();
                statute.revision += 1;
                statute.updated_at = event.timestamp;
            }
            (StatuteEventKind::Repeal, Some(statute)) if statute.is_active() => {
                statute.status = StatuteStatus::Repealed;
                statute.revision += 1;
                statute.updated_at = event.timestamp;
            }
            (kind, state) => {
                tracing::warn!(
                    statute = %event.statute.id,
                    %kind,
                    timestamp = %event.timestamp,
                    repealed = state.is_some(),
                    "Ignoring event with no active statute to apply to"
                );
            }
        }
    }

    current
}

/// Sorted event log plus the statutes derived from it.
#[derive(Debug, Default, Clone)]
pub struct Projection {
    log: Vec<StatuteEvent>,
    statutes: BTreeMap<String, Statute>,
}

impl Projection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from events in append order.
    pub fn replay<I>(events: I) -> Self
    where
        I: IntoIterator<Item = StatuteEvent>,
    {
        let mut projection = Self::new();
        for event in events {
            projection.append(event);
        }
        projection
    }

    /// Insert `event` at its timestamp position and refold its statute.
    ///
    /// Returns the statute's new state, if it has one.
    pub fn append(&mut self, event: StatuteEvent) -> Option<&Statute> {
        let id = event.statute.id.clone();
        let at = self.log.partition_point(|e| e.timestamp <= event.timestamp);
        self.log.insert(at, event);

        match fold(self.log.iter().filter(|e| e.statute.id == id)) {
            Some(statute) => {
                self.statutes.insert(id.clone(), statute);
                self.statutes.get(&id)
            }
            None => {
                self.statutes.remove(&id);
                None
            }
        }
    }

    /// The full log in timestamp order.
    #[must_use]
    pub fn events(&self) -> &[StatuteEvent] {
        &self.log
    }

    #[must_use]
    pub fn statute(&self, id: &str) -> Option<&Statute> {
        self.statutes.get(id)
    }

    /// Every projected statute, including repealed ones, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &Statute> {
        self.statutes.values()
    }

    /// Active statutes ordered by id.
    pub fn current(&self) -> impl Iterator<Item = &Statute> {
        self.statutes.values().filter(|s| s.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StatuteRecord;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(id: &str, title: &str) -> StatuteRecord {
        StatuteRecord::new(id, "Colorado", title)
    }

    #[test]
    fn test_latest_enactment_wins_regardless_of_append_order() {
        let mut projection = Projection::new();
        projection.append(StatuteEvent::enactment(record("a", "v3"), at(30)));
        projection.append(StatuteEvent::enactment(record("a", "v1"), at(10)));
        projection.append(StatuteEvent::enactment(record("b", "only"), at(5)));
        projection.append(StatuteEvent::enactment(record("a", "v2"), at(20)));

        let a = projection.statute("a").unwrap();
        assert_eq!(a.record.title, "v3");
        assert_eq!(a.revision, 3);
        assert_eq!(a.enacted_at, at(10));
        assert_eq!(projection.current().count(), 2);

        let stamps: Vec<_> = projection.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![at(5), at(10), at(20), at(30)]);
    }

    #[test]
    fn test_amendment_supersedes_text() {
        let mut projection = Projection::new();
        projection.append(StatuteEvent::enactment(
            record("a", "Theft").with_content("old"),
            at(0),
        ));
        projection.append(StatuteEvent::amendment(
            record("a", "Theft").with_content("new"),
            at(1),
        ));

        let a = projection.statute("a").unwrap();
        assert_eq!(a.record.content.as_deref(), Some("new"));
        assert_eq!(a.revision, 2);
        assert!(a.is_active());
    }

    #[test]
    fn test_orphan_amendment_is_ignored() {
        let mut projection = Projection::new();
        assert!(projection
            .append(StatuteEvent::amendment(record("a", "x"), at(0)))
            .is_none());
        assert!(projection.statute("a").is_none());
        assert_eq!(projection.events().len(), 1);
    }

    #[test]
    fn test_late_enactment_before_amendment_is_refolded() {
        let mut projection = Projection::new();
        projection.append(StatuteEvent::amendment(
            record("a", "x").with_content("amended"),
            at(10),
        ));
        projection.append(StatuteEvent::enactment(
            record("a", "x").with_content("enacted"),
            at(0),
        ));

        let a = projection.statute("a").unwrap();
        assert_eq!(a.record.content.as_deref(), Some("amended"));
        assert_eq!(a.revision, 2);
    }

    #[test]
    fn test_repeal_hides_from_current() {
        let mut projection = Projection::new();
        projection.append(StatuteEvent::enactment(record("a", "x"), at(0)));
        projection.append(StatuteEvent::repeal(record("a", "x"), at(1)));
        projection.append(StatuteEvent::amendment(record("a", "ignored"), at(2)));

        let a = projection.statute("a").unwrap();
        assert_eq!(a.status, StatuteStatus::Repealed);
        assert_eq!(a.record.title, "x");
        assert_eq!(projection.current().count(), 0);
        assert_eq!(projection.all().count(), 1);

        projection.append(StatuteEvent::enactment(record("a", "back"), at(3)));
        assert!(projection.statute("a").unwrap().is_active());
    }

    #[test]
    fn test_equal_timestamps_keep_append_order() {
        let mut projection = Projection::new();
        projection.append(StatuteEvent::enactment(record("a", "first"), at(0)));
        projection.append(StatuteEvent::enactment(record("a", "second"), at(0)));

        assert_eq!(projection.statute("a").unwrap().record.title, "second");
    }

    #[test]
    fn test_replay_matches_incremental() {
        let events = vec![
            StatuteEvent::enactment(record("a", "v2"), at(2)),
            StatuteEvent::enactment(record("a", "v1"), at(1)),
            StatuteEvent::repeal(record("b", "gone"), at(0)),
        ];
        let replayed = Projection::replay(events.clone());

        let mut incremental = Projection::new();
        for event in events {
            incremental.append(event);
        }

        assert_eq!(replayed.statute("a"), incremental.statute("a"));
        assert!(replayed.statute("b").is_none());
    }
}
