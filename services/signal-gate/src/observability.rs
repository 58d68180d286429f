//! Observability: in-process cycle metrics

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

use crate::detector::GateDecision;
use crate::observation::JoinedObservation;

/// Metrics collector shared by the runner and cycle driver
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<MetricsInner>>,
}

struct MetricsInner {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner {
                counters: BTreeMap::new(),
                gauges: BTreeMap::new(),
                start_time: Instant::now(),
            })),
        }
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str, value: u64) {
        let mut inner = self.inner.write().await;
        *inner.counters.entry(name.to_string()).or_insert(0) += value;
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        let inner = self.inner.read().await;
        inner.counters.get(name).copied().unwrap_or(0)
    }

    /// Count one finished cycle
    pub async fn record_cycle(
        &self,
        observation: &JoinedObservation,
        decision: &GateDecision,
        elapsed: Duration,
    ) {
        let mut inner = self.inner.write().await;
        let mut bump = |name: String| *inner.counters.entry(name).or_insert(0) += 1;

        bump(metrics::CYCLES.to_string());
        if decision.proceed {
            bump(metrics::CYCLES_PROCEED.to_string());
        } else {
            bump(metrics::CYCLES_SKIPPED.to_string());
        }
        bump(format!("{}{}", metrics::OUTCOME_PREFIX, decision.outcome.as_str()));
        if observation.partial {
            bump(metrics::CYCLES_PARTIAL.to_string());
        }
        if observation.is_total_outage() {
            bump(metrics::CYCLES_OUTAGE.to_string());
        }
        for signal in &decision.triggered_signals {
            bump(format!("{}{}", metrics::SIGNAL_PREFIX, signal.kind.as_str()));
        }
        for snapshot in observation.snapshots.values() {
            if let Some(err) = snapshot.error() {
                bump(format!(
                    "{}{}_{}",
                    metrics::SOURCE_ERROR_PREFIX,
                    snapshot.source().as_str(),
                    err.kind.as_str()
                ));
            }
        }

        inner
            .gauges
            .insert(metrics::LAST_CYCLE_DURATION_MS.to_string(), elapsed.as_millis() as f64);
        inner
            .gauges
            .insert(metrics::LAST_SIGNAL_COUNT.to_string(), decision.signal_count as f64);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read().await;
        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            uptime_secs: inner.start_time.elapsed().as_secs(),
        }
    }

    /// Emit the current counters as one structured log line
    pub async fn log_snapshot(&self) {
        let snap = self.snapshot().await;
        let counters = serde_json::to_string(&snap.counters).unwrap_or_default();
        info!(
            uptime_secs = snap.uptime_secs,
            cycles = snap.counters.get(metrics::CYCLES).copied().unwrap_or(0),
            proceed = snap.counters.get(metrics::CYCLES_PROCEED).copied().unwrap_or(0),
            %counters,
            "Gate metrics"
        );
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub uptime_secs: u64,
}

/// Predefined metric names
pub mod metrics {
    // Cycles
    pub const CYCLES: &str = "cycles_total";
    pub const CYCLES_PROCEED: &str = "cycles_proceed_total";
    pub const CYCLES_SKIPPED: &str = "cycles_skipped_total";
    pub const CYCLES_PARTIAL: &str = "cycles_partial_total";
    pub const CYCLES_OUTAGE: &str = "cycles_outage_total";
    pub const OUTCOME_PREFIX: &str = "outcome_";

    // Signals and sources
    pub const SIGNAL_PREFIX: &str = "signal_";
    pub const SOURCE_ERROR_PREFIX: &str = "source_error_";

    // Downstream
    pub const ANALYSIS_RUNS: &str = "analysis_runs_total";
    pub const ANALYSIS_FAILURES: &str = "analysis_failures_total";
    pub const SINK_FAILURES: &str = "sink_failures_total";

    pub const LAST_CYCLE_DURATION_MS: &str = "last_cycle_duration_ms";
    pub const LAST_SIGNAL_COUNT: &str = "last_signal_count";
}
