use crate::normalizers::{
    base_asset, classify_headline, sentiment_label, sentiment_score, HeadlineTone,
};
use crate::sources::http::{network_error, read_json};
use crate::types::*;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

/// Newest headlines scored per collection
const HEADLINE_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
}

/// CryptoCompare headline sentiment collector.
///
/// Without an API key the collector reports the source as unavailable
/// instead of failing, so the gate simply skips the news rule.
pub struct NewsSentimentCollector {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsSentimentCollector {
    const REQUEST_TIMEOUT_SECS: u64 = 20;

    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| network_error("cryptocompare", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    async fn fetch(&self, symbol: &str) -> Result<FactorSnapshot> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                return Err(FeedError::NotConfigured(
                    "no CryptoCompare API key configured".to_string(),
                ))
            }
        };

        let coin = base_asset(symbol);
        info!(symbol, coin = %coin, "Collecting news sentiment");

        let url = format!("{}/data/v2/news/", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("categories", coin.as_str()), ("lang", "EN")])
            .header("authorization", format!("Apikey {}", api_key))
            .send()
            .await
            .map_err(|e| network_error("cryptocompare", e))?;

        let body: NewsResponse = read_json(response, "cryptocompare").await?;

        let titles: Vec<&str> = body
            .data
            .iter()
            .map(|item| item.title.trim())
            .filter(|t| !t.is_empty())
            .take(HEADLINE_LIMIT)
            .collect();

        if titles.is_empty() {
            warn!(symbol, message = %body.message, "CryptoCompare returned no headlines");
            return Ok(FactorSnapshot::unavailable(
                FactorSource::NewsSentiment,
                symbol,
                format!("no headlines returned: {}", body.message),
            ));
        }

        Ok(FactorSnapshot::available(
            FactorSource::NewsSentiment,
            symbol,
            score_headlines(&titles),
        ))
    }
}

fn score_headlines(titles: &[&str]) -> Metrics {
    let (mut positive, mut negative, mut neutral) = (0usize, 0usize, 0usize);
    for title in titles {
        match classify_headline(title) {
            HeadlineTone::Positive => positive += 1,
            HeadlineTone::Negative => negative += 1,
            HeadlineTone::Neutral => neutral += 1,
        }
    }
    let score = sentiment_score(positive, negative, neutral);

    let mut metrics = Metrics::new();
    metrics.insert(metric_keys::SENTIMENT_SCORE.to_string(), score.into());
    metrics.insert(metric_keys::SENTIMENT_LABEL.to_string(), sentiment_label(score).into());
    metrics.insert(metric_keys::NEWS_COUNT.to_string(), (titles.len() as f64).into());
    metrics.insert(metric_keys::POSITIVE_COUNT.to_string(), (positive as f64).into());
    metrics.insert(metric_keys::NEGATIVE_COUNT.to_string(), (negative as f64).into());
    metrics.insert(metric_keys::NEUTRAL_COUNT.to_string(), (neutral as f64).into());
    if let Some(latest) = titles.first() {
        metrics.insert(metric_keys::LATEST_HEADLINE.to_string(), (*latest).into());
    }
    metrics
}

#[async_trait::async_trait]
impl Collector for NewsSentimentCollector {
    fn source(&self) -> FactorSource {
        FactorSource::NewsSentiment
    }

    async fn collect(&self, symbol: &str) -> Result<FactorSnapshot> {
        match self.fetch(symbol).await {
            Err(FeedError::NotConfigured(reason)) => Ok(FactorSnapshot::unavailable(
                FactorSource::NewsSentiment,
                symbol,
                reason,
            )),
            other => other,
        }
    }

    fn name(&self) -> &str {
        "cryptocompare_news"
    }
}
