use crate::normalizers::{mean, parse_number};
use crate::sources::binance::BinanceFuturesClient;
use crate::types::*;
use serde_json::Value;
use tracing::info;

/// Hourly candles covering the trailing 24h
const KLINE_INTERVAL: &str = "1h";
const KLINE_LIMIT: usize = 24;

// Column offsets in a Binance kline row
const COL_OPEN: usize = 1;
const COL_HIGH: usize = 2;
const COL_LOW: usize = 3;
const COL_CLOSE: usize = 4;
const COL_QUOTE_VOLUME: usize = 7;

/// Parsed hourly candle
#[derive(Debug, Clone, Copy)]
struct Bar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    quote_volume: f64,
}

impl Bar {
    fn from_row(row: &[Value]) -> Result<Self> {
        let field = |idx: usize, name: &str| -> Result<f64> {
            match row.get(idx) {
                Some(Value::String(s)) => parse_number(s, name),
                Some(Value::Number(n)) => n
                    .as_f64()
                    .ok_or_else(|| FeedError::InvalidResponse(format!("{} out of range", name))),
                _ => Err(FeedError::InvalidResponse(format!(
                    "kline row missing {} (column {})",
                    name, idx
                ))),
            }
        };

        Ok(Self {
            open: field(COL_OPEN, "open")?,
            high: field(COL_HIGH, "high")?,
            low: field(COL_LOW, "low")?,
            close: field(COL_CLOSE, "close")?,
            quote_volume: field(COL_QUOTE_VOLUME, "quoteVolume")?,
        })
    }
}

/// 24h price change and volume collector
pub struct KlineVolumeCollector {
    client: BinanceFuturesClient,
}

impl KlineVolumeCollector {
    pub fn new(client: BinanceFuturesClient) -> Self {
        Self { client }
    }

    async fn fetch(&self, symbol: &str) -> Result<FactorSnapshot> {
        info!(symbol, "Collecting klines and volume");

        let rows: Vec<Vec<Value>> = self
            .client
            .get_json(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("interval", KLINE_INTERVAL.to_string()),
                    ("limit", KLINE_LIMIT.to_string()),
                ],
            )
            .await?;

        let bars = rows
            .iter()
            .map(|row| Bar::from_row(row))
            .collect::<Result<Vec<Bar>>>()?;

        Ok(FactorSnapshot::available(
            FactorSource::PriceVolume,
            symbol,
            summarize(&bars)?,
        ))
    }
}

/// Reduce the candle window to the metrics the gate consumes
fn summarize(bars: &[Bar]) -> Result<Metrics> {
    let (first, last) = match (bars.first(), bars.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(FeedError::InvalidResponse("no klines returned".to_string())),
    };

    if first.open <= 0.0 {
        return Err(FeedError::InvalidResponse(format!(
            "non-positive opening price {}",
            first.open
        )));
    }

    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let change_pct = (last.close - first.open) / first.open * 100.0;

    let price_trend = if change_pct > 1.0 {
        "rising"
    } else if change_pct < -1.0 {
        "falling"
    } else {
        "ranging"
    };

    let mut metrics = Metrics::new();
    metrics.insert(metric_keys::CURRENT_PRICE.to_string(), last.close.into());
    metrics.insert(metric_keys::HIGH_24H.to_string(), high.into());
    metrics.insert(metric_keys::LOW_24H.to_string(), low.into());
    metrics.insert(metric_keys::PRICE_CHANGE_PCT.to_string(), change_pct.into());
    metrics.insert(metric_keys::PRICE_TREND.to_string(), price_trend.into());
    metrics.insert(metric_keys::CURRENT_VOLUME.to_string(), last.quote_volume.into());

    // Trailing average excludes the bar being compared against it
    let trailing: Vec<f64> = bars[..bars.len() - 1].iter().map(|b| b.quote_volume).collect();
    if let Some(avg) = mean(&trailing) {
        metrics.insert(metric_keys::AVG_VOLUME.to_string(), avg.into());
        if avg > 0.0 {
            metrics.insert(
                metric_keys::VOLUME_RATIO.to_string(),
                (last.quote_volume / avg).into(),
            );
        }
    }

    Ok(metrics)
}

#[async_trait::async_trait]
impl Collector for KlineVolumeCollector {
    fn source(&self) -> FactorSource {
        FactorSource::PriceVolume
    }

    async fn collect(&self, symbol: &str) -> Result<FactorSnapshot> {
        self.fetch(symbol).await
    }

    fn name(&self) -> &str {
        "binance_klines"
    }
}
