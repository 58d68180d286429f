//! Signal Gate - periodic market telemetry collection and signal gating
//!
//! 1. Loads settings (`.env`, optional TOML file, `GATE__*` overrides)
//! 2. Builds the factor collectors and the orchestrator
//! 3. Runs a gate cycle per symbol on a fixed interval
//! 4. Forwards gated observations to the analysis endpoint and records
//!    every cycle to the configured sinks

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use factor_feeds::{BinanceFuturesClient, NewsSentimentCollector, RetryPolicy};
use signal_gate::{
    AnalysisStep, ConfigHandle, GateRunner, JournalSink, LogSink, MetricsCollector, NoopAnalysis,
    Orchestrator, PreviousCycleStore, Settings, WebhookAlertSink, WebhookAnalysis,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Signal Gate...");

    let settings = Settings::load()?;
    let once = std::env::args().any(|a| a == "--once");

    info!(
        symbols = ?settings.runner.symbols,
        interval_secs = settings.runner.interval_secs,
        min_signals = settings.detection.min_signal_count,
        detection_enabled = settings.detection.enabled,
        "Settings loaded"
    );

    let runner = build_runner(&settings).await?;

    if once {
        let mut runner = runner;
        let reports = runner.run_round().await;
        for report in &reports {
            info!(
                symbol = report.symbol(),
                proceed = report.decision.proceed,
                reason = %report.decision.reason,
                "Cycle complete"
            );
        }
        runner.metrics().log_snapshot().await;
        return Ok(());
    }

    runner.run(shutdown_signal()).await
}

async fn build_runner(settings: &Settings) -> anyhow::Result<GateRunner> {
    let retry = RetryPolicy {
        max_attempts: settings.collectors.max_attempts,
        delay: Duration::from_millis(settings.collectors.retry_delay_ms),
    };
    let binance = BinanceFuturesClient::with_base_url(&settings.collectors.binance_base_url)?
        .with_retry_policy(retry);
    let news = NewsSentimentCollector::with_base_url(
        &settings.collectors.news_base_url,
        settings.collectors.news_api_key.clone(),
    )?;
    if settings.collectors.news_api_key.is_none() {
        warn!("No news API key configured, news sentiment will be reported unavailable");
    }

    let orchestrator = Arc::new(Orchestrator::new(
        factor_feeds::default_collectors(binance, news),
        settings.detection.per_collector_timeout,
    )?);
    info!(sources = ?orchestrator.sources(), "✓ Collectors initialized");

    let config = ConfigHandle::new(settings.detection.clone())?;
    let previous = Arc::new(PreviousCycleStore::new(
        settings.runner.history_max_symbols,
        settings.runner.history_max_age(),
    ));

    let analysis: Arc<dyn AnalysisStep> = match &settings.analysis.webhook_url {
        Some(url) => {
            info!(%url, "✓ Analysis webhook configured");
            Arc::new(WebhookAnalysis::new(
                url,
                Duration::from_secs(settings.analysis.timeout_secs),
            )?)
        }
        None => {
            warn!("No analysis endpoint configured, gated cycles will not be analyzed");
            Arc::new(NoopAnalysis)
        }
    };

    let mut runner = GateRunner::new(orchestrator, config, settings.runner.symbols.clone())
        .with_interval(settings.runner.interval())
        .with_previous_store(previous)
        .with_analysis(analysis)
        .with_metrics(MetricsCollector::new(), settings.runner.metrics_log_every);

    if let Some(dir) = &settings.sinks.journal_dir {
        let journal = JournalSink::new(dir);
        journal.init().await?;
        info!(dir = %dir, "✓ Journal sink enabled");
        runner = runner.with_sink(Arc::new(journal));
    }
    if let Some(url) = &settings.sinks.alert_webhook_url {
        let alerts = WebhookAlertSink::new(
            url,
            Duration::from_secs(settings.sinks.alert_cooldown_secs),
        )?;
        info!("✓ Alert webhook enabled");
        runner = runner.with_sink(Arc::new(alerts));
    }
    if settings.sinks.log_cycles {
        runner = runner.with_sink(Arc::new(LogSink));
    }

    Ok(runner)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
