use crate::normalizers::{mean, parse_number, trend_label};
use crate::sources::binance::BinanceFuturesClient;
use crate::types::*;
use serde::Deserialize;
use tracing::info;

/// Funding settlements pulled per collection (8h intervals, ~8 days)
const HISTORY_LIMIT: usize = 24;
/// Points averaged on each end when labelling the trend
const TREND_WINDOW: usize = 6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingRateEntry {
    funding_rate: String,
    funding_time: i64,
}

/// Perpetual funding rate collector
pub struct FundingRateCollector {
    client: BinanceFuturesClient,
}

impl FundingRateCollector {
    pub fn new(client: BinanceFuturesClient) -> Self {
        Self { client }
    }

    async fn fetch(&self, symbol: &str) -> Result<FactorSnapshot> {
        info!(symbol, "Collecting funding rate");

        let mut entries: Vec<FundingRateEntry> = self
            .client
            .get_json(
                "/fapi/v1/fundingRate",
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("limit", HISTORY_LIMIT.to_string()),
                ],
            )
            .await?;

        entries.sort_by_key(|e| e.funding_time);

        let rates = entries
            .iter()
            .map(|e| parse_number(&e.funding_rate, "fundingRate"))
            .collect::<Result<Vec<f64>>>()?;

        let current = *rates.last().ok_or_else(|| {
            FeedError::InvalidResponse(format!("empty funding rate history for {}", symbol))
        })?;

        let max_rate = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_rate = rates.iter().copied().fold(f64::INFINITY, f64::min);

        let mut metrics = Metrics::new();
        metrics.insert(metric_keys::CURRENT_RATE.to_string(), current.into());
        metrics.insert(metric_keys::MAX_RATE.to_string(), max_rate.into());
        metrics.insert(metric_keys::MIN_RATE.to_string(), min_rate.into());
        if let Some(avg) = mean(&rates) {
            metrics.insert(metric_keys::AVG_RATE.to_string(), avg.into());
        }
        metrics.insert(metric_keys::SETTLEMENTS.to_string(), (rates.len() as f64).into());
        metrics.insert(
            metric_keys::RATE_TREND.to_string(),
            trend_label(&rates, TREND_WINDOW).into(),
        );

        Ok(FactorSnapshot::available(FactorSource::FundingRate, symbol, metrics))
    }
}

#[async_trait::async_trait]
impl Collector for FundingRateCollector {
    fn source(&self) -> FactorSource {
        FactorSource::FundingRate
    }

    async fn collect(&self, symbol: &str) -> Result<FactorSnapshot> {
        self.fetch(symbol).await
    }

    fn name(&self) -> &str {
        "binance_funding_rate"
    }
}
