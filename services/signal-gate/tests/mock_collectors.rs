//! Scripted collectors, analysis steps and sinks for driving the gate
//! without network access

use async_trait::async_trait;
use factor_feeds::{metric_keys, Collector, FactorSnapshot, FactorSource, FeedError, Metrics};
use signal_gate::{AnalysisOutcome, AnalysisStep, CycleReport, CycleSink, JoinedObservation};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a mock collector does on one call
#[derive(Clone)]
pub enum Step {
    Data(Metrics),
    Unavailable(&'static str),
    Fail(fn() -> FeedError),
    /// Never completes; flips the flag when the task is dropped
    Hang(Arc<AtomicBool>),
}

/// Collector that replays a script, repeating the last step once exhausted
pub struct MockCollector {
    source: FactorSource,
    delay: Duration,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockCollector {
    pub fn new(source: FactorSource, steps: Vec<Step>) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
            script: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<dyn Collector> {
        Arc::new(self)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = script.pop_front() {
            *last = Some(step);
        }
        last.clone().unwrap_or(Step::Unavailable("empty script"))
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn source(&self) -> FactorSource {
        self.source
    }

    async fn collect(&self, symbol: &str) -> factor_feeds::Result<FactorSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        tokio::time::sleep(self.delay).await;

        match step {
            Step::Data(metrics) => Ok(FactorSnapshot::available(self.source, symbol, metrics)),
            Step::Unavailable(reason) => {
                Ok(FactorSnapshot::unavailable(self.source, symbol, reason))
            }
            Step::Fail(make) => Err(make()),
            Step::Hang(flag) => {
                let _guard = DropFlag(flag);
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn metrics(pairs: &[(&str, f64)]) -> Metrics {
    pairs.iter().map(|(k, v)| (k.to_string(), (*v).into())).collect()
}

pub fn funding(rate: f64) -> Step {
    Step::Data(metrics(&[(metric_keys::CURRENT_RATE, rate)]))
}

pub fn price_volume(change_pct: f64, volume: f64, avg_volume: f64) -> Step {
    Step::Data(metrics(&[
        (metric_keys::CURRENT_PRICE, 65_000.0),
        (metric_keys::PRICE_CHANGE_PCT, change_pct),
        (metric_keys::CURRENT_VOLUME, volume),
        (metric_keys::AVG_VOLUME, avg_volume),
    ]))
}

pub fn pressure(long_short: f64, taker: f64) -> Step {
    Step::Data(metrics(&[
        (metric_keys::LONG_SHORT_RATIO, long_short),
        (metric_keys::TAKER_BUY_SELL_RATIO, taker),
    ]))
}

pub fn news(score: f64) -> Step {
    Step::Data(metrics(&[(metric_keys::SENTIMENT_SCORE, score)]))
}

pub fn network_down() -> FeedError {
    FeedError::Network("connection refused".to_string())
}

/// Four collectors reporting a quiet market
pub fn quiet_collectors() -> Vec<Arc<dyn Collector>> {
    vec![
        MockCollector::new(FactorSource::FundingRate, vec![funding(0.0001)]).shared(),
        MockCollector::new(FactorSource::PriceVolume, vec![price_volume(0.8, 100.0, 100.0)])
            .shared(),
        MockCollector::new(FactorSource::MarketPressure, vec![pressure(1.1, 1.0)]).shared(),
        MockCollector::new(FactorSource::NewsSentiment, vec![news(0.1)]).shared(),
    ]
}

/// Analysis step that records the observations it was given
#[derive(Default)]
pub struct RecordingAnalysis {
    pub seen: Mutex<Vec<JoinedObservation>>,
    pub fail: bool,
}

impl RecordingAnalysis {
    pub fn failing() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisStep for RecordingAnalysis {
    async fn analyze(&self, observation: &JoinedObservation) -> anyhow::Result<AnalysisOutcome> {
        self.seen.lock().unwrap().push(observation.clone());
        if self.fail {
            anyhow::bail!("model endpoint returned 503");
        }
        Ok(AnalysisOutcome {
            provider: "recording".to_string(),
            text: format!("analysis of {}", observation.symbol),
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Sink that keeps every report, optionally failing after recording
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<CycleReport>>,
    pub fail: bool,
    delay: Duration,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Waits `delay` before keeping each report
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

#[async_trait]
impl CycleSink for RecordingSink {
    async fn record(&self, report: &CycleReport) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.reports.lock().unwrap().push(report.clone());
        if self.fail {
            anyhow::bail!("disk full");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
