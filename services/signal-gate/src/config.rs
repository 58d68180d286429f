//! Gate configuration
//!
//! `DetectionConfig` is what the detector and orchestrator read every
//! cycle. `Settings` is the full process configuration loaded by the
//! binary from an optional TOML file layered under `GATE__*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{GateError, Result};

/// Thresholds and switches for the signal detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Distinct signal kinds required before the gate opens
    pub min_signal_count: usize,
    /// Absolute funding rate considered extreme (0.001 = 0.1%)
    pub funding_rate_extreme_threshold: f64,
    /// Cycle-over-cycle funding rate move that counts as a signal
    pub funding_rate_change_threshold: f64,
    /// Absolute 24h price change in percent
    pub price_change_threshold: f64,
    /// Current volume over its reference volume
    pub volume_surge_ratio: f64,
    pub market_pressure_bounds: MarketPressureBounds,
    /// Absolute news sentiment score in [0, 1]
    pub news_sentiment_threshold: f64,
    #[serde(rename = "per_collector_timeout_secs", with = "duration_secs")]
    pub per_collector_timeout: Duration,
    /// When false every cycle proceeds (signals are still recorded)
    pub enabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_signal_count: 2,
            funding_rate_extreme_threshold: 0.001,
            funding_rate_change_threshold: 0.0005,
            price_change_threshold: 5.0,
            volume_surge_ratio: 2.0,
            market_pressure_bounds: MarketPressureBounds::default(),
            news_sentiment_threshold: 0.5,
            per_collector_timeout: Duration::from_secs(30),
            enabled: true,
        }
    }
}

/// Normal ranges for positioning ratios; values strictly outside fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPressureBounds {
    pub long_short_ratio_low: f64,
    pub long_short_ratio_high: f64,
    pub taker_buy_sell_ratio_low: f64,
    pub taker_buy_sell_ratio_high: f64,
}

impl Default for MarketPressureBounds {
    fn default() -> Self {
        Self {
            long_short_ratio_low: 0.5,
            long_short_ratio_high: 2.5,
            taker_buy_sell_ratio_low: 0.8,
            taker_buy_sell_ratio_high: 1.2,
        }
    }
}

impl DetectionConfig {
    /// Reject configurations the detector cannot evaluate meaningfully
    pub fn validate(&self) -> Result<()> {
        if self.min_signal_count == 0 {
            return Err(GateError::ConfigInvalid(
                "min_signal_count must be at least 1".to_string(),
            ));
        }

        let thresholds = [
            ("funding_rate_extreme_threshold", self.funding_rate_extreme_threshold),
            ("funding_rate_change_threshold", self.funding_rate_change_threshold),
            ("price_change_threshold", self.price_change_threshold),
            ("volume_surge_ratio", self.volume_surge_ratio),
            ("news_sentiment_threshold", self.news_sentiment_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(GateError::ConfigInvalid(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.volume_surge_ratio <= 0.0 {
            return Err(GateError::ConfigInvalid(
                "volume_surge_ratio must be greater than zero".to_string(),
            ));
        }

        let b = &self.market_pressure_bounds;
        check_bounds("long_short_ratio", b.long_short_ratio_low, b.long_short_ratio_high)?;
        check_bounds(
            "taker_buy_sell_ratio",
            b.taker_buy_sell_ratio_low,
            b.taker_buy_sell_ratio_high,
        )?;

        if self.per_collector_timeout.is_zero() {
            return Err(GateError::ConfigInvalid(
                "per_collector_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_bounds(name: &str, low: f64, high: f64) -> Result<()> {
    if !low.is_finite() || !high.is_finite() || low < 0.0 || low >= high {
        return Err(GateError::ConfigInvalid(format!(
            "{} bounds must satisfy 0 <= low < high, got ({}, {})",
            name, low, high
        )));
    }
    Ok(())
}

/// Shared, swappable detection config.
///
/// Readers take a cheap `Arc` snapshot once per cycle; `replace` validates
/// before swapping so a bad update never reaches a running cycle.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<DetectionConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    pub fn current(&self) -> Arc<DetectionConfig> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, config: DetectionConfig) -> Result<()> {
        config.validate()?;
        let next = Arc::new(config);
        match self.inner.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        Ok(())
    }
}

/// Interval scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub symbols: Vec<String>,
    pub interval_secs: u64,
    /// Previous-cycle values older than this are ignored (default 3x interval)
    pub history_max_age_secs: Option<u64>,
    pub history_max_symbols: usize,
    /// Log a metrics snapshot every N rounds, one round being a cycle per
    /// symbol (0 disables)
    pub metrics_log_every: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            interval_secs: 300,
            history_max_age_secs: None,
            history_max_symbols: 64,
            metrics_log_every: 12,
        }
    }
}

impl RunnerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn history_max_age(&self) -> Duration {
        let secs = self
            .history_max_age_secs
            .unwrap_or_else(|| self.interval_secs.saturating_mul(3));
        Duration::from_secs(secs)
    }
}

/// Upstream data source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    pub binance_base_url: String,
    pub news_base_url: String,
    pub news_api_key: Option<String>,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            binance_base_url: factor_feeds::sources::binance::DEFAULT_BASE_URL.to_string(),
            news_base_url: factor_feeds::sources::news_sentiment::DEFAULT_BASE_URL.to_string(),
            news_api_key: None,
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Downstream analysis endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// No URL means the analysis step is a no-op
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 120,
        }
    }
}

/// Where cycle results go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub journal_dir: Option<String>,
    pub alert_webhook_url: Option<String>,
    pub alert_cooldown_secs: u64,
    pub log_cycles: bool,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            journal_dir: Some("data/journal".to_string()),
            alert_webhook_url: None,
            alert_cooldown_secs: 1800,
            log_cycles: true,
        }
    }
}

/// Full process configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection: DetectionConfig,
    pub runner: RunnerSettings,
    pub collectors: CollectorSettings,
    pub analysis: AnalysisSettings,
    pub sinks: SinkSettings,
}

/// Env var naming the TOML file to layer under the environment
pub const CONFIG_PATH_ENV: &str = "SIGNAL_GATE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "signal-gate.toml";

impl Settings {
    /// Load `.env`, the optional TOML file, then `GATE__*` overrides
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("GATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("runner.symbols")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;

        if self.runner.symbols.iter().all(|s| s.trim().is_empty()) {
            return Err(GateError::ConfigInvalid(
                "runner.symbols must name at least one symbol".to_string(),
            ));
        }
        if self.runner.interval_secs == 0 {
            return Err(GateError::ConfigInvalid(
                "runner.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.runner.history_max_symbols == 0 {
            return Err(GateError::ConfigInvalid(
                "runner.history_max_symbols must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_signal_count, 2);
        assert_eq!(config.funding_rate_extreme_threshold, 0.001);
        assert_eq!(config.per_collector_timeout, Duration::from_secs(30));
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_min_signal_count() {
        let config = DetectionConfig {
            min_signal_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GateError::ConfigInvalid(_))));
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let negative = DetectionConfig {
            price_change_threshold: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let nan = DetectionConfig {
            funding_rate_extreme_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let zero_ratio = DetectionConfig {
            volume_surge_ratio: 0.0,
            ..Default::default()
        };
        assert!(zero_ratio.validate().is_err());

        let zero_timeout = DetectionConfig {
            per_collector_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = DetectionConfig {
            market_pressure_bounds: MarketPressureBounds {
                taker_buy_sell_ratio_low: 1.2,
                taker_buy_sell_ratio_high: 1.2,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_handle_keeps_old_config_on_invalid_replace() {
        let handle = ConfigHandle::new(DetectionConfig::default()).unwrap();
        let before = handle.current();

        let bad = DetectionConfig {
            min_signal_count: 0,
            ..Default::default()
        };
        assert!(handle.replace(bad).is_err());
        assert_eq!(handle.current().min_signal_count, 2);

        let good = DetectionConfig {
            min_signal_count: 3,
            ..Default::default()
        };
        handle.replace(good).unwrap();
        assert_eq!(handle.current().min_signal_count, 3);
        // snapshots taken earlier are unaffected
        assert_eq!(before.min_signal_count, 2);
    }

    #[test]
    fn test_history_max_age_defaults_to_three_intervals() {
        let runner = RunnerSettings {
            interval_secs: 60,
            ..Default::default()
        };
        assert_eq!(runner.history_max_age(), Duration::from_secs(180));

        let explicit = RunnerSettings {
            history_max_age_secs: Some(10),
            ..runner
        };
        assert_eq!(explicit.history_max_age(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        std::fs::write(
            &path,
            r#"
[detection]
min_signal_count = 3
price_change_threshold = 4.0
per_collector_timeout_secs = 12

[detection.market_pressure_bounds]
long_short_ratio_high = 3.0

[runner]
symbols = ["SOLUSDT"]
interval_secs = 60
"#,
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.detection.min_signal_count, 3);
        assert_eq!(settings.detection.price_change_threshold, 4.0);
        assert_eq!(settings.detection.per_collector_timeout, Duration::from_secs(12));
        assert_eq!(settings.detection.market_pressure_bounds.long_short_ratio_high, 3.0);
        assert_eq!(settings.detection.market_pressure_bounds.long_short_ratio_low, 0.5);
        assert_eq!(settings.runner.symbols, vec!["SOLUSDT".to_string()]);
        assert_eq!(settings.detection.funding_rate_extreme_threshold, 0.001);
    }
}
