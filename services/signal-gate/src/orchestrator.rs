//! Concurrent fan-out / fan-in over the configured collectors

use factor_feeds::{Collector, CollectorError, CollectorErrorKind, FactorSnapshot, FactorSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{GateError, Result};
use crate::observation::{JoinedObservation, ObservationBuilder};

/// Runs every collector for a symbol in parallel and joins the results.
///
/// Each collector gets its own task and its own deadline. A slow, failing
/// or panicking collector only affects its own slot; the join waits for
/// every slot before returning.
pub struct Orchestrator {
    collectors: Vec<Arc<dyn Collector>>,
    per_collector_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        collectors: Vec<Arc<dyn Collector>>,
        per_collector_timeout: Duration,
    ) -> Result<Self> {
        if collectors.is_empty() {
            return Err(GateError::ConfigInvalid(
                "at least one collector is required".to_string(),
            ));
        }
        if per_collector_timeout.is_zero() {
            return Err(GateError::ConfigInvalid(
                "per_collector_timeout must be greater than zero".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for collector in &collectors {
            if !seen.insert(collector.source()) {
                return Err(GateError::ConfigInvalid(format!(
                    "duplicate collector for source {} ({})",
                    collector.source(),
                    collector.name()
                )));
            }
        }

        Ok(Self {
            collectors,
            per_collector_timeout,
        })
    }

    pub fn sources(&self) -> Vec<FactorSource> {
        self.collectors.iter().map(|c| c.source()).collect()
    }

    pub async fn run(&self, symbol: &str) -> JoinedObservation {
        self.run_with_timeout(symbol, self.per_collector_timeout).await
    }

    /// Run one collection cycle with an explicit per-collector deadline
    pub async fn run_with_timeout(&self, symbol: &str, timeout: Duration) -> JoinedObservation {
        let mut builder = ObservationBuilder::new(symbol, self.sources());
        let cycle_id = builder.cycle_id();
        let started = Instant::now();

        info!(
            symbol,
            %cycle_id,
            collectors = self.collectors.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Collecting factors"
        );

        let tasks: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let source = collector.source();
                let name = collector.name().to_string();
                let task = {
                    let collector = Arc::clone(collector);
                    let symbol = symbol.to_string();
                    AbortOnDrop(tokio::spawn(async move { collector.collect(&symbol).await }))
                };
                collect_one(task, source, name, symbol, timeout)
            })
            .collect();

        for snapshot in futures::future::join_all(tasks).await {
            builder.insert(snapshot);
        }

        let observation = builder.freeze();
        let available = observation.available_sources().len();
        let total = observation.snapshots.len();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if observation.is_total_outage() {
            warn!(symbol, %cycle_id, elapsed_ms, "All factor sources unavailable");
        } else {
            info!(symbol, %cycle_id, available, total, elapsed_ms, "Factors joined");
        }

        observation
    }
}

/// Aborts the collector task if the cycle is dropped before it finishes
struct AbortOnDrop(JoinHandle<factor_feeds::Result<FactorSnapshot>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn collect_one(
    mut task: AbortOnDrop,
    source: FactorSource,
    name: String,
    symbol: &str,
    timeout: Duration,
) -> FactorSnapshot {
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, &mut task.0).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(Ok(snapshot))) if snapshot.source() == source => {
            debug!(
                symbol,
                source = %source,
                collector = %name,
                elapsed_ms,
                available = snapshot.is_available(),
                "Collector finished"
            );
            snapshot
        }
        Ok(Ok(Ok(snapshot))) => {
            warn!(
                symbol,
                source = %source,
                collector = %name,
                reported = %snapshot.source(),
                "Collector reported a snapshot for the wrong source"
            );
            FactorSnapshot::failed(
                source,
                symbol,
                CollectorError::new(
                    CollectorErrorKind::Internal,
                    format!("{} reported source {}", name, snapshot.source()),
                ),
            )
        }
        Ok(Ok(Err(e))) => {
            warn!(
                symbol,
                source = %source,
                collector = %name,
                kind = e.kind().as_str(),
                error = %e,
                elapsed_ms,
                "Collector failed"
            );
            FactorSnapshot::from_feed_error(source, symbol, &e)
        }
        Ok(Err(join_err)) => {
            warn!(
                symbol,
                source = %source,
                collector = %name,
                error = %join_err,
                "Collector task aborted"
            );
            let message = if join_err.is_panic() {
                format!("{} panicked", name)
            } else {
                format!("{} was cancelled", name)
            };
            FactorSnapshot::failed(
                source,
                symbol,
                CollectorError::new(CollectorErrorKind::Internal, message),
            )
        }
        Err(_) => {
            task.0.abort();
            warn!(
                symbol,
                source = %source,
                collector = %name,
                timeout_ms = timeout.as_millis() as u64,
                "Collector timed out"
            );
            FactorSnapshot::failed(source, symbol, CollectorError::timeout(timeout))
        }
    }
}
