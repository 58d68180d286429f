use crate::normalizers::parse_number;
use crate::sources::binance::BinanceFuturesClient;
use crate::types::*;
use serde::Deserialize;
use tracing::info;

/// Aggregation period for the ratio endpoints
const RATIO_PERIOD: &str = "1h";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LongShortAccountRatio {
    long_short_ratio: String,
    long_account: String,
    short_account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakerBuySellRatio {
    buy_sell_ratio: String,
    buy_vol: String,
    sell_vol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterest {
    open_interest: String,
}

/// Positioning and order-flow pressure collector.
///
/// Combines the global long/short account ratio, the taker buy/sell volume
/// ratio and open interest; all three are fetched concurrently.
pub struct MarketPressureCollector {
    client: BinanceFuturesClient,
}

impl MarketPressureCollector {
    pub fn new(client: BinanceFuturesClient) -> Self {
        Self { client }
    }

    async fn fetch(&self, symbol: &str) -> Result<FactorSnapshot> {
        info!(symbol, "Collecting market pressure");

        let ratio_query = [
            ("symbol", symbol.to_uppercase()),
            ("period", RATIO_PERIOD.to_string()),
            ("limit", "1".to_string()),
        ];
        let oi_query = [("symbol", symbol.to_uppercase())];

        let (accounts, takers, open_interest) = tokio::try_join!(
            self.client.get_json::<Vec<LongShortAccountRatio>>(
                "/futures/data/globalLongShortAccountRatio",
                &ratio_query
            ),
            self.client.get_json::<Vec<TakerBuySellRatio>>(
                "/futures/data/takerlongshortRatio",
                &ratio_query
            ),
            self.client
                .get_json::<OpenInterest>("/fapi/v1/openInterest", &oi_query),
        )?;

        let accounts = accounts.last().ok_or_else(|| {
            FeedError::InvalidResponse("empty long/short account ratio".to_string())
        })?;
        let takers = takers
            .last()
            .ok_or_else(|| FeedError::InvalidResponse("empty taker buy/sell ratio".to_string()))?;

        let mut metrics = Metrics::new();
        metrics.insert(
            metric_keys::LONG_SHORT_RATIO.to_string(),
            parse_number(&accounts.long_short_ratio, "longShortRatio")?.into(),
        );
        metrics.insert(
            metric_keys::LONG_ACCOUNT_PCT.to_string(),
            (parse_number(&accounts.long_account, "longAccount")? * 100.0).into(),
        );
        metrics.insert(
            metric_keys::SHORT_ACCOUNT_PCT.to_string(),
            (parse_number(&accounts.short_account, "shortAccount")? * 100.0).into(),
        );
        metrics.insert(
            metric_keys::TAKER_BUY_SELL_RATIO.to_string(),
            parse_number(&takers.buy_sell_ratio, "buySellRatio")?.into(),
        );
        metrics.insert(
            metric_keys::TAKER_BUY_VOLUME.to_string(),
            parse_number(&takers.buy_vol, "buyVol")?.into(),
        );
        metrics.insert(
            metric_keys::TAKER_SELL_VOLUME.to_string(),
            parse_number(&takers.sell_vol, "sellVol")?.into(),
        );
        metrics.insert(
            metric_keys::OPEN_INTEREST.to_string(),
            parse_number(&open_interest.open_interest, "openInterest")?.into(),
        );

        Ok(FactorSnapshot::available(FactorSource::MarketPressure, symbol, metrics))
    }
}

#[async_trait::async_trait]
impl Collector for MarketPressureCollector {
    fn source(&self) -> FactorSource {
        FactorSource::MarketPressure
    }

    async fn collect(&self, symbol: &str) -> Result<FactorSnapshot> {
        self.fetch(symbol).await
    }

    fn name(&self) -> &str {
        "binance_market_pressure"
    }
}
