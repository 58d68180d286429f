//! Cycle driver: collect, evaluate, analyze, record

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::detector::{GateDecision, SignalDetector};
use crate::error::{GateError, Result};
use crate::history::PreviousCycleStore;
use crate::observability::{metrics, MetricsCollector};
use crate::observation::JoinedObservation;
use crate::orchestrator::Orchestrator;
use crate::sinks::CycleSink;

/// Lifecycle of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Init,
    Collecting,
    Joined,
    Evaluated,
    Skipped,
    Proceed,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Init => "init",
            CyclePhase::Collecting => "collecting",
            CyclePhase::Joined => "joined",
            CyclePhase::Evaluated => "evaluated",
            CyclePhase::Skipped => "skipped",
            CyclePhase::Proceed => "proceed",
        }
    }
}

/// Result returned by a downstream analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub provider: String,
    pub text: String,
}

/// What happened to the analysis step this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// The gate stayed closed
    NotRequested,
    Completed(AnalysisOutcome),
    Failed { error: String },
}

/// Expensive downstream step invoked only when the gate opens
#[async_trait]
pub trait AnalysisStep: Send + Sync {
    async fn analyze(&self, observation: &JoinedObservation) -> anyhow::Result<AnalysisOutcome>;

    fn name(&self) -> &str;
}

/// Analysis step used when no endpoint is configured
pub struct NoopAnalysis;

#[async_trait]
impl AnalysisStep for NoopAnalysis {
    async fn analyze(&self, observation: &JoinedObservation) -> anyhow::Result<AnalysisOutcome> {
        Ok(AnalysisOutcome {
            provider: self.name().to_string(),
            text: format!("analysis skipped for {}: no endpoint configured", observation.symbol),
        })
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// POSTs the joined observation to an external analysis service
pub struct WebhookAnalysis {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    analysis: String,
}

impl WebhookAnalysis {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisStep for WebhookAnalysis {
    async fn analyze(&self, observation: &JoinedObservation) -> anyhow::Result<AnalysisOutcome> {
        let payload = serde_json::json!({
            "cycle_id": observation.cycle_id,
            "symbol": observation.symbol,
            "observation": observation,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("analysis endpoint failed: {} - {}", status, body));
        }

        // Either {"analysis": "..."} or a plain-text body
        let body = response.text().await?;
        let text = match serde_json::from_str::<AnalysisResponse>(&body) {
            Ok(parsed) => parsed.analysis,
            Err(_) => body,
        };

        Ok(AnalysisOutcome {
            provider: self.name().to_string(),
            text,
        })
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Everything one cycle produced
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub observation: Arc<JoinedObservation>,
    pub decision: GateDecision,
    pub analysis: AnalysisStatus,
    pub phase: CyclePhase,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn symbol(&self) -> &str {
        &self.observation.symbol
    }
}

fn enter(phase: &mut CyclePhase, next: CyclePhase, symbol: &str) {
    debug!(symbol, from = phase.as_str(), to = next.as_str(), "Cycle phase");
    *phase = next;
}

/// A cycle that has been collected, evaluated and (if gated) analyzed but
/// not yet handed to sinks or the previous-cycle store.
///
/// Dropping it discards the cycle without a trace.
#[derive(Debug)]
pub struct PendingCycle {
    report: CycleReport,
    started: Instant,
}

/// Run one full gate cycle for `symbol`.
///
/// Collector, analysis and sink failures are absorbed and logged; only an
/// invalid symbol is an error.
#[allow(clippy::too_many_arguments)]
pub async fn run_cycle(
    symbol: &str,
    orchestrator: &Orchestrator,
    detector: &SignalDetector,
    previous: &PreviousCycleStore,
    analysis: &dyn AnalysisStep,
    sinks: &[Arc<dyn CycleSink>],
    stats: &MetricsCollector,
) -> Result<CycleReport> {
    let pending = prepare_cycle(symbol, orchestrator, detector, previous, analysis, stats).await?;
    Ok(commit_cycle(pending, previous, sinks, stats).await)
}

/// Collect, evaluate and analyze without recording anything.
///
/// Safe to cancel at any await point: collector tasks are aborted and
/// nothing reaches the sinks or the previous-cycle store.
pub async fn prepare_cycle(
    symbol: &str,
    orchestrator: &Orchestrator,
    detector: &SignalDetector,
    previous: &PreviousCycleStore,
    analysis: &dyn AnalysisStep,
    stats: &MetricsCollector,
) -> Result<PendingCycle> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(GateError::InvalidSymbol(symbol.to_string()));
    }

    let started = Instant::now();
    let mut phase = CyclePhase::Init;

    enter(&mut phase, CyclePhase::Collecting, symbol);
    let observation = orchestrator
        .run_with_timeout(symbol, detector.config().per_collector_timeout)
        .await;
    let observation = Arc::new(observation);
    enter(&mut phase, CyclePhase::Joined, symbol);

    let view = previous.view(symbol, observation.cycle_started_at);
    let decision = detector.evaluate(&observation, &view);
    enter(&mut phase, CyclePhase::Evaluated, symbol);

    info!(
        symbol,
        cycle_id = %observation.cycle_id,
        outcome = decision.outcome.as_str(),
        signals = decision.signal_count,
        proceed = decision.proceed,
        reason = %decision.reason,
        "Gate evaluated"
    );

    let analysis_status = if decision.proceed {
        enter(&mut phase, CyclePhase::Proceed, symbol);
        stats.increment(metrics::ANALYSIS_RUNS, 1).await;
        match analysis.analyze(&observation).await {
            Ok(outcome) => {
                info!(
                    symbol,
                    cycle_id = %observation.cycle_id,
                    provider = %outcome.provider,
                    "Analysis completed"
                );
                AnalysisStatus::Completed(outcome)
            }
            Err(e) => {
                error!(
                    symbol,
                    cycle_id = %observation.cycle_id,
                    step = analysis.name(),
                    "Analysis failed: {:#}",
                    e
                );
                stats.increment(metrics::ANALYSIS_FAILURES, 1).await;
                AnalysisStatus::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    } else {
        enter(&mut phase, CyclePhase::Skipped, symbol);
        AnalysisStatus::NotRequested
    };

    let report = CycleReport {
        observation: Arc::clone(&observation),
        decision,
        analysis: analysis_status,
        phase,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    Ok(PendingCycle { report, started })
}

/// Hand a prepared cycle to every sink, then update history and metrics
pub async fn commit_cycle(
    pending: PendingCycle,
    previous: &PreviousCycleStore,
    sinks: &[Arc<dyn CycleSink>],
    stats: &MetricsCollector,
) -> CycleReport {
    let PendingCycle { report, started } = pending;
    let symbol = report.symbol();

    for sink in sinks {
        if let Err(e) = sink.record(&report).await {
            warn!(
                symbol,
                cycle_id = %report.observation.cycle_id,
                sink = sink.name(),
                "Sink failed: {:#}",
                e
            );
            stats.increment(metrics::SINK_FAILURES, 1).await;
        }
    }

    previous.record(&report.observation);
    stats
        .record_cycle(&report.observation, &report.decision, started.elapsed())
        .await;

    report
}
