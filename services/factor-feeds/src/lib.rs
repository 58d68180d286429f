//! Factor feeds - typed market telemetry snapshots and the collectors that produce them

pub mod types;
pub mod sources {
    pub mod binance;
    pub mod funding_rate;
    pub(crate) mod http;
    pub mod kline_volume;
    pub mod market_pressure;
    pub mod news_sentiment;
}
pub mod normalizers;

pub use types::*;
pub use sources::binance::{BinanceFuturesClient, RetryPolicy};
pub use sources::funding_rate::FundingRateCollector;
pub use sources::kline_volume::KlineVolumeCollector;
pub use sources::market_pressure::MarketPressureCollector;
pub use sources::news_sentiment::NewsSentimentCollector;

use std::sync::Arc;

/// Build the standard collector set: three Binance futures collectors sharing
/// one HTTP client, plus the CryptoCompare news collector.
pub fn default_collectors(
    binance: BinanceFuturesClient,
    news: NewsSentimentCollector,
) -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(FundingRateCollector::new(binance.clone())),
        Arc::new(KlineVolumeCollector::new(binance.clone())),
        Arc::new(MarketPressureCollector::new(binance)),
        Arc::new(news),
    ]
}
