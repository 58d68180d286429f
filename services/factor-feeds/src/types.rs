use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Factor family a collector reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorSource {
    FundingRate,
    PriceVolume,
    MarketPressure,
    NewsSentiment,
}

impl FactorSource {
    pub const ALL: [FactorSource; 4] = [
        FactorSource::FundingRate,
        FactorSource::PriceVolume,
        FactorSource::MarketPressure,
        FactorSource::NewsSentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorSource::FundingRate => "funding_rate",
            FactorSource::PriceVolume => "price_volume",
            FactorSource::MarketPressure => "market_pressure",
            FactorSource::NewsSentiment => "news_sentiment",
        }
    }
}

impl fmt::Display for FactorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single source-specific metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            MetricValue::Number(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Named metrics keyed by source-specific field names
pub type Metrics = BTreeMap<String, MetricValue>;

/// Well-known metric keys shared between collectors and the detector
pub mod metric_keys {
    // Funding rate
    pub const CURRENT_RATE: &str = "current_rate";
    /// Extremes and mean over the fetched settlement window
    pub const MAX_RATE: &str = "max_rate_window";
    pub const MIN_RATE: &str = "min_rate_window";
    pub const AVG_RATE: &str = "avg_rate_window";
    /// Number of funding settlements in that window
    pub const SETTLEMENTS: &str = "settlements";
    pub const RATE_TREND: &str = "trend";

    // Price / volume
    pub const CURRENT_PRICE: &str = "current_price";
    pub const HIGH_24H: &str = "high_24h";
    pub const LOW_24H: &str = "low_24h";
    pub const PRICE_CHANGE_PCT: &str = "price_change_pct";
    pub const PRICE_TREND: &str = "price_trend";
    pub const CURRENT_VOLUME: &str = "current_volume";
    pub const AVG_VOLUME: &str = "avg_volume";
    pub const VOLUME_RATIO: &str = "volume_ratio";

    // Market pressure
    pub const LONG_SHORT_RATIO: &str = "long_short_ratio";
    pub const LONG_ACCOUNT_PCT: &str = "long_account_pct";
    pub const SHORT_ACCOUNT_PCT: &str = "short_account_pct";
    pub const TAKER_BUY_SELL_RATIO: &str = "taker_buy_sell_ratio";
    pub const TAKER_BUY_VOLUME: &str = "taker_buy_volume";
    pub const TAKER_SELL_VOLUME: &str = "taker_sell_volume";
    pub const OPEN_INTEREST: &str = "open_interest";

    // News sentiment
    pub const SENTIMENT_SCORE: &str = "sentiment_score";
    pub const SENTIMENT_LABEL: &str = "sentiment";
    pub const NEWS_COUNT: &str = "news_count";
    pub const POSITIVE_COUNT: &str = "positive_count";
    pub const NEGATIVE_COUNT: &str = "negative_count";
    pub const NEUTRAL_COUNT: &str = "neutral_count";
    pub const LATEST_HEADLINE: &str = "latest_headline";
}

/// Failure category recorded on a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorErrorKind {
    Timeout,
    Network,
    Auth,
    RateLimited,
    Parse,
    /// Collector task panicked or reported the wrong source
    Internal,
}

impl CollectorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorErrorKind::Timeout => "timeout",
            CollectorErrorKind::Network => "network",
            CollectorErrorKind::Auth => "auth",
            CollectorErrorKind::RateLimited => "rate_limited",
            CollectorErrorKind::Parse => "parse",
            CollectorErrorKind::Internal => "internal",
        }
    }
}

/// Failure descriptor attached to a snapshot whose collection failed outright
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorError {
    pub kind: CollectorErrorKind,
    pub message: String,
}

impl CollectorError {
    pub fn new(kind: CollectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            CollectorErrorKind::Timeout,
            format!("collector did not finish within {}ms", after.as_millis()),
        )
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// One source's data for one cycle, or an explicit record of its absence.
///
/// Fields are private so a snapshot can only be built through
/// [`FactorSnapshot::available`], [`FactorSnapshot::unavailable`] or
/// [`FactorSnapshot::failed`]: an available snapshot always carries real
/// metrics, an unavailable one never carries any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSnapshot {
    source: FactorSource,
    symbol: String,
    collected_at: DateTime<Utc>,
    available: bool,
    metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CollectorError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unavailable_reason: Option<String>,
}

impl FactorSnapshot {
    /// Snapshot backed by real data. An empty metric set is recorded as unavailable.
    pub fn available(source: FactorSource, symbol: &str, metrics: Metrics) -> Self {
        if metrics.is_empty() {
            return Self::unavailable(source, symbol, "source returned no metrics");
        }
        Self {
            source,
            symbol: symbol.to_string(),
            collected_at: Utc::now(),
            available: true,
            metrics,
            error: None,
            unavailable_reason: None,
        }
    }

    /// No data, but not a failure (missing credentials, nothing published)
    pub fn unavailable(source: FactorSource, symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            source,
            symbol: symbol.to_string(),
            collected_at: Utc::now(),
            available: false,
            metrics: Metrics::new(),
            error: None,
            unavailable_reason: Some(reason.into()),
        }
    }

    /// Collection failed outright
    pub fn failed(source: FactorSource, symbol: &str, error: CollectorError) -> Self {
        Self {
            source,
            symbol: symbol.to_string(),
            collected_at: Utc::now(),
            available: false,
            metrics: Metrics::new(),
            error: Some(error),
            unavailable_reason: None,
        }
    }

    /// Map a feed error onto the snapshot it implies.
    ///
    /// `NotConfigured` is a configuration gap rather than a failure, so it
    /// yields an unavailable snapshot without an error descriptor.
    pub fn from_feed_error(source: FactorSource, symbol: &str, err: &FeedError) -> Self {
        match err {
            FeedError::NotConfigured(reason) => Self::unavailable(source, symbol, reason.clone()),
            other => Self::failed(
                source,
                symbol,
                CollectorError::new(other.kind(), other.to_string()),
            ),
        }
    }

    pub fn source(&self) -> FactorSource {
        self.source
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn error(&self) -> Option<&CollectorError> {
        self.error.as_ref()
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable_reason.as_deref()
    }

    /// Numeric metric, `None` when the snapshot is unavailable or the key is absent
    pub fn number(&self, key: &str) -> Option<f64> {
        if !self.available {
            return None;
        }
        self.metrics.get(key).and_then(MetricValue::as_f64)
    }

    /// Categorical metric, `None` when the snapshot is unavailable or the key is absent
    pub fn text(&self, key: &str) -> Option<&str> {
        if !self.available {
            return None;
        }
        self.metrics.get(key).and_then(MetricValue::as_text)
    }
}

/// Error types for factor collection
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("API request failed: {0}")]
    Network(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

impl FeedError {
    /// Snapshot error category for this failure
    pub fn kind(&self) -> CollectorErrorKind {
        match self {
            FeedError::Network(_) | FeedError::Api { .. } => CollectorErrorKind::Network,
            FeedError::RateLimit { .. } => CollectorErrorKind::RateLimited,
            FeedError::Unauthorized(_) | FeedError::NotConfigured(_) => CollectorErrorKind::Auth,
            FeedError::InvalidResponse(_) => CollectorErrorKind::Parse,
        }
    }

    /// Transient failures worth another attempt inside a collector
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Network(_) | FeedError::RateLimit { .. } => true,
            FeedError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for factor collection
pub type Result<T> = std::result::Result<T, FeedError>;

/// A capability that produces one factor's snapshot for a symbol
#[async_trait::async_trait]
pub trait Collector: Send + Sync {
    /// Factor family this collector fills
    fn source(&self) -> FactorSource;

    /// Collect the factor for `symbol`.
    ///
    /// Returns an unavailable snapshot (not an error) when the source cannot
    /// run for configuration reasons; retries, if any, happen in here.
    async fn collect(&self, symbol: &str) -> Result<FactorSnapshot>;

    /// Collector name for logs
    fn name(&self) -> &str {
        self.source().as_str()
    }
}
