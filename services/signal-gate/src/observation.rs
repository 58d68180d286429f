//! Joined multi-source observation for one cycle

use chrono::{DateTime, Utc};
use factor_feeds::{CollectorError, CollectorErrorKind, FactorSnapshot, FactorSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Everything the collectors reported for one symbol in one cycle.
///
/// Every configured source has exactly one snapshot, available or not.
/// Immutable once frozen; shared with sinks behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedObservation {
    pub cycle_id: Uuid,
    pub symbol: String,
    pub cycle_started_at: DateTime<Utc>,
    pub cycle_joined_at: DateTime<Utc>,
    pub snapshots: BTreeMap<FactorSource, FactorSnapshot>,
    /// True when at least one collector failed or timed out. A source
    /// that is merely unconfigured (no credentials) does not count.
    pub partial: bool,
}

impl JoinedObservation {
    pub fn snapshot(&self, source: FactorSource) -> Option<&FactorSnapshot> {
        self.snapshots.get(&source)
    }

    /// Snapshot for `source` only if it carries real data
    pub fn available(&self, source: FactorSource) -> Option<&FactorSnapshot> {
        self.snapshot(source).filter(|s| s.is_available())
    }

    pub fn available_sources(&self) -> Vec<FactorSource> {
        self.snapshots
            .values()
            .filter(|s| s.is_available())
            .map(|s| s.source())
            .collect()
    }

    pub fn unavailable_count(&self) -> usize {
        self.snapshots.values().filter(|s| !s.is_available()).count()
    }

    pub fn is_total_outage(&self) -> bool {
        self.snapshots.values().all(|s| !s.is_available())
    }

    /// Sources whose collector failed with the given error kind
    pub fn failed_with(&self, kind: CollectorErrorKind) -> Vec<FactorSource> {
        self.snapshots
            .values()
            .filter(|s| s.error().map(|e| e.kind) == Some(kind))
            .map(|s| s.source())
            .collect()
    }
}

/// Single-owner accumulator for one cycle's snapshots.
///
/// Slots are fixed when the cycle starts; a slot the orchestrator never
/// fills is frozen as an internal failure rather than silently dropped.
#[derive(Debug)]
pub struct ObservationBuilder {
    cycle_id: Uuid,
    symbol: String,
    started_at: DateTime<Utc>,
    slots: BTreeMap<FactorSource, Option<FactorSnapshot>>,
}

impl ObservationBuilder {
    pub fn new(symbol: &str, sources: impl IntoIterator<Item = FactorSource>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            started_at: Utc::now(),
            slots: sources.into_iter().map(|s| (s, None)).collect(),
        }
    }

    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    /// Fill the slot for `snapshot.source()`.
    ///
    /// Returns false (and drops the snapshot) if the source was not
    /// configured for this cycle.
    pub fn insert(&mut self, snapshot: FactorSnapshot) -> bool {
        match self.slots.get_mut(&snapshot.source()) {
            Some(slot) => {
                *slot = Some(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn freeze(self) -> JoinedObservation {
        let symbol = self.symbol;
        let snapshots: BTreeMap<FactorSource, FactorSnapshot> = self
            .slots
            .into_iter()
            .map(|(source, slot)| {
                let snapshot = slot.unwrap_or_else(|| {
                    FactorSnapshot::failed(
                        source,
                        &symbol,
                        CollectorError::new(CollectorErrorKind::Internal, "no result recorded"),
                    )
                });
                (source, snapshot)
            })
            .collect();

        let partial = snapshots.values().any(|s| s.error().is_some());

        JoinedObservation {
            cycle_id: self.cycle_id,
            symbol,
            cycle_started_at: self.started_at,
            cycle_joined_at: Utc::now(),
            snapshots,
            partial,
        }
    }
}
