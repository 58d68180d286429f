//! Previous-cycle store
//!
//! Holds the most recent prior values per symbol so change-based rules
//! (funding rate delta, volume fallback reference) have something to
//! compare against. Bounded in symbols and in age.

use chrono::{DateTime, Utc};
use factor_feeds::{FactorSource, Metrics};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::observation::JoinedObservation;

pub const DEFAULT_MAX_SYMBOLS: usize = 64;

#[derive(Debug, Clone)]
struct RecordedSource {
    cycle_id: Uuid,
    observed_at: DateTime<Utc>,
    metrics: Metrics,
}

#[derive(Debug, Default)]
struct SymbolEntry {
    sources: BTreeMap<FactorSource, RecordedSource>,
    touched: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, SymbolEntry>,
    clock: u64,
}

/// Most recent prior cycle per symbol, with LRU eviction
#[derive(Debug)]
pub struct PreviousCycleStore {
    inner: Mutex<StoreInner>,
    max_symbols: usize,
    max_age: Duration,
}

impl PreviousCycleStore {
    pub fn new(max_symbols: usize, max_age: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            max_symbols: max_symbols.max(1),
            max_age,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Prior values for `symbol` still young enough at `now`
    pub fn view(&self, symbol: &str, now: DateTime<Utc>) -> PreviousView {
        let inner = self.lock();
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));

        let values = inner
            .entries
            .get(symbol)
            .map(|entry| {
                entry
                    .sources
                    .iter()
                    .filter(|(_, rec)| now.signed_duration_since(rec.observed_at) <= max_age)
                    .map(|(source, rec)| (*source, rec.metrics.clone()))
                    .collect()
            })
            .unwrap_or_default();

        PreviousView { values }
    }

    /// Record the available snapshots of a finished cycle.
    ///
    /// Unavailable sources keep their older value; a total outage leaves
    /// the store untouched.
    pub fn record(&self, observation: &JoinedObservation) {
        if observation.is_total_outage() {
            return;
        }

        let mut inner = self.lock();
        inner.clock += 1;
        let touched = inner.clock;

        if !inner.entries.contains_key(&observation.symbol)
            && inner.entries.len() >= self.max_symbols
        {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.touched)
                .map(|(symbol, _)| symbol.clone());
            if let Some(symbol) = oldest {
                inner.entries.remove(&symbol);
            }
        }

        let entry = inner.entries.entry(observation.symbol.clone()).or_default();
        entry.touched = touched;
        for snapshot in observation.snapshots.values().filter(|s| s.is_available()) {
            entry.sources.insert(
                snapshot.source(),
                RecordedSource {
                    cycle_id: observation.cycle_id,
                    observed_at: snapshot.collected_at(),
                    metrics: snapshot.metrics().clone(),
                },
            );
        }
    }

    /// Cycle that last wrote `source` for `symbol`
    pub fn last_cycle(&self, symbol: &str, source: FactorSource) -> Option<Uuid> {
        self.lock()
            .entries
            .get(symbol)
            .and_then(|e| e.sources.get(&source))
            .map(|rec| rec.cycle_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PreviousCycleStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SYMBOLS, Duration::from_secs(900))
    }
}

/// Read-only prior values handed to the detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousView {
    values: BTreeMap<FactorSource, Metrics>,
}

impl PreviousView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn number(&self, source: FactorSource, key: &str) -> Option<f64> {
        self.values
            .get(&source)
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_f64())
    }

    /// Build a view directly, for callers that keep their own history
    pub fn with_number(mut self, source: FactorSource, key: &str, value: f64) -> Self {
        self.values
            .entry(source)
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
