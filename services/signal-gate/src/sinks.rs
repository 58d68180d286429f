//! Cycle sinks - every cycle's result goes to each configured sink

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cycle::{AnalysisStatus, CycleReport};
use factor_feeds::{metric_keys, FactorSource};

/// Receives the outcome of every cycle, whether or not the gate opened
#[async_trait]
pub trait CycleSink: Send + Sync {
    async fn record(&self, report: &CycleReport) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}

/// Append-only JSON Lines journal plus a per-symbol latest snapshot.
///
/// Layout under the journal directory:
/// `cycles-YYYY-MM-DD.jsonl` (one report per line) and
/// `<SYMBOL>/latest.json` (most recent report, pretty-printed).
pub struct JournalSink {
    journal_dir: PathBuf,
}

impl JournalSink {
    pub fn new(journal_dir: impl AsRef<Path>) -> Self {
        Self {
            journal_dir: journal_dir.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.journal_dir).await?;
        Ok(())
    }

    pub fn journal_path(&self, day: DateTime<Utc>) -> PathBuf {
        self.journal_dir
            .join(format!("cycles-{}.jsonl", day.format("%Y-%m-%d")))
    }

    pub fn latest_path(&self, symbol: &str) -> PathBuf {
        let dir: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.journal_dir.join(dir).join("latest.json")
    }
}

#[async_trait]
impl CycleSink for JournalSink {
    async fn record(&self, report: &CycleReport) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(report)?;
        line.push('\n');

        let journal = self.journal_path(report.observation.cycle_started_at);
        if let Some(parent) = journal.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        let latest = self.latest_path(report.symbol());
        if let Some(parent) = latest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&latest, serde_json::to_string_pretty(report)?).await?;

        debug!(path = %journal.display(), symbol = report.symbol(), "Journaled cycle");
        Ok(())
    }

    fn name(&self) -> &str {
        "journal"
    }
}

/// Posts a text alert when the gate opens, at most once per cooldown per symbol
#[derive(Clone)]
pub struct WebhookAlertSink {
    client: Client,
    url: String,
    cooldown: Duration,
    /// Last successful alert per symbol
    last_fired: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl WebhookAlertSink {
    pub fn new(url: &str, cooldown: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            cooldown,
            last_fired: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Check if an alert should fire (rate limiting)
    async fn should_fire(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let state = self.last_fired.read().await;
        match state.get(symbol) {
            Some(last) => {
                let elapsed = now.signed_duration_since(*last);
                elapsed.to_std().map(|e| e >= self.cooldown).unwrap_or(false)
            }
            None => true,
        }
    }

    async fn record_fired(&self, symbol: &str, now: DateTime<Utc>) {
        let mut state = self.last_fired.write().await;
        state.insert(symbol.to_string(), now);
    }
}

/// Human-readable alert body for a cycle that opened the gate
pub fn format_alert(report: &CycleReport) -> String {
    let obs = &report.observation;
    let mut lines = vec![format!(
        "[signal-gate] {} | {}",
        obs.symbol, report.decision.reason
    )];

    if let Some(price) = obs
        .available(FactorSource::PriceVolume)
        .and_then(|s| s.number(metric_keys::CURRENT_PRICE))
    {
        lines.push(format!("price: {}", price));
    }
    for signal in &report.decision.triggered_signals {
        lines.push(format!(
            "- {} ({}): {}",
            signal.kind,
            signal.strength.as_str(),
            signal.description
        ));
    }
    if obs.unavailable_count() > 0 {
        lines.push(format!(
            "sources unavailable: {}/{}",
            obs.unavailable_count(),
            obs.snapshots.len()
        ));
    }
    match &report.analysis {
        AnalysisStatus::Completed(outcome) => lines.push(format!("analysis: {}", outcome.text)),
        AnalysisStatus::Failed { error } => lines.push(format!("analysis failed: {}", error)),
        AnalysisStatus::NotRequested => {}
    }
    lines.push(format!("cycle: {} at {}", obs.cycle_id, obs.cycle_joined_at.to_rfc3339()));

    lines.join("\n")
}

#[async_trait]
impl CycleSink for WebhookAlertSink {
    async fn record(&self, report: &CycleReport) -> anyhow::Result<()> {
        if !report.decision.proceed {
            return Ok(());
        }

        let symbol = report.symbol();
        let now = Utc::now();
        if !self.should_fire(symbol, now).await {
            debug!(symbol, "Alert suppressed by cooldown");
            return Ok(());
        }

        let payload = serde_json::json!({
            "msg_type": "text",
            "content": { "text": format_alert(report) },
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Alert webhook failed: {} - {}", status, body));
        }

        self.record_fired(symbol, now).await;
        info!(symbol, cycle_id = %report.observation.cycle_id, "Alert sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook_alert"
    }
}

/// Structured one-line summary of every cycle
pub struct LogSink;

#[async_trait]
impl CycleSink for LogSink {
    async fn record(&self, report: &CycleReport) -> anyhow::Result<()> {
        let obs = &report.observation;
        let available = obs
            .available_sources()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let metric = |source: FactorSource, key: &str| {
            obs.available(source)
                .and_then(|s| s.number(key))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        };

        info!(
            symbol = %obs.symbol,
            cycle_id = %obs.cycle_id,
            phase = report.phase.as_str(),
            outcome = report.decision.outcome.as_str(),
            signals = report.decision.signal_count,
            available = %available,
            price = %metric(FactorSource::PriceVolume, metric_keys::CURRENT_PRICE),
            change_pct = %metric(FactorSource::PriceVolume, metric_keys::PRICE_CHANGE_PCT),
            funding_rate = %metric(FactorSource::FundingRate, metric_keys::CURRENT_RATE),
            long_short = %metric(FactorSource::MarketPressure, metric_keys::LONG_SHORT_RATIO),
            sentiment = %metric(FactorSource::NewsSentiment, metric_keys::SENTIMENT_SCORE),
            elapsed_ms = report.elapsed_ms,
            "Cycle summary"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
