//! Gate runner - fixed-interval loop over the configured symbols

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::ConfigHandle;
use crate::cycle::{commit_cycle, prepare_cycle, AnalysisStep, CycleReport, NoopAnalysis};
use crate::detector::SignalDetector;
use crate::history::PreviousCycleStore;
use crate::observability::MetricsCollector;
use crate::orchestrator::Orchestrator;
use crate::sinks::CycleSink;

/// Runs gate cycles for each symbol, one symbol at a time, on an interval
pub struct GateRunner {
    orchestrator: Arc<Orchestrator>,
    config: ConfigHandle,
    previous: Arc<PreviousCycleStore>,
    analysis: Arc<dyn AnalysisStep>,
    sinks: Vec<Arc<dyn CycleSink>>,
    metrics: MetricsCollector,
    symbols: Vec<String>,
    interval: Duration,
    metrics_log_every: u64,
    rounds: u64,
}

impl GateRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        config: ConfigHandle,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            config,
            previous: Arc::new(PreviousCycleStore::default()),
            analysis: Arc::new(NoopAnalysis),
            sinks: Vec::new(),
            metrics: MetricsCollector::new(),
            symbols: symbols
                .into_iter()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            interval: Duration::from_secs(300),
            metrics_log_every: 0,
            rounds: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_previous_store(mut self, previous: Arc<PreviousCycleStore>) -> Self {
        self.previous = previous;
        self
    }

    pub fn with_analysis(mut self, analysis: Arc<dyn AnalysisStep>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn CycleSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector, log_every: u64) -> Self {
        self.metrics = metrics;
        self.metrics_log_every = log_every;
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Run until `shutdown` resolves.
    ///
    /// Shutdown while a cycle is collecting or analyzing drops that cycle,
    /// which aborts its collector tasks; nothing from it is recorded. A
    /// cycle already handed to the sinks is always committed in full.
    pub async fn run<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            symbols = ?self.symbols,
            interval_secs = self.interval.as_secs(),
            sinks = self.sinks.len(),
            analysis = self.analysis.name(),
            "Gate runner starting main loop..."
        );

        tokio::pin!(shutdown);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let (_, stopped) = self.round(shutdown.as_mut()).await;
                    if stopped {
                        break;
                    }
                }
            }
        }

        self.metrics.log_snapshot().await;
        info!("Gate runner stopped");
        Ok(())
    }

    /// One pass over every symbol, sequentially
    pub async fn run_round(&mut self) -> Vec<CycleReport> {
        let never = std::future::pending::<()>();
        tokio::pin!(never);
        let (reports, _) = self.round(never).await;
        reports
    }

    /// Returns the committed reports and whether `shutdown` fired mid-round
    async fn round<F>(&mut self, mut shutdown: Pin<&mut F>) -> (Vec<CycleReport>, bool)
    where
        F: Future<Output = ()>,
    {
        let mut reports = Vec::with_capacity(self.symbols.len());

        for symbol in &self.symbols {
            // One config snapshot per cycle; swaps apply from the next cycle
            let detector = match SignalDetector::with_shared(self.config.current()) {
                Ok(d) => d,
                Err(e) => {
                    error!(symbol = %symbol, "Skipping cycle: {}", e);
                    continue;
                }
            };

            let prepared = tokio::select! {
                _ = shutdown.as_mut() => {
                    warn!(
                        symbol = %symbol,
                        "Shutdown requested mid-cycle, discarding in-flight cycle"
                    );
                    return (reports, true);
                }
                prepared = prepare_cycle(
                    symbol,
                    &self.orchestrator,
                    &detector,
                    &self.previous,
                    self.analysis.as_ref(),
                    &self.metrics,
                ) => prepared,
            };

            match prepared {
                Ok(pending) => {
                    let report =
                        commit_cycle(pending, &self.previous, &self.sinks, &self.metrics).await;
                    reports.push(report);
                }
                Err(e) => error!(symbol = %symbol, "Cycle error: {}", e),
            }
        }

        self.rounds += 1;
        if self.metrics_log_every > 0 && self.rounds % self.metrics_log_every == 0 {
            self.metrics.log_snapshot().await;
        }

        (reports, false)
    }
}
