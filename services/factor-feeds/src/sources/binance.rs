use crate::sources::http::{network_error, read_json};
use crate::types::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Public USDⓈ-M futures REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Longest server-requested backoff honoured before retrying
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// How often a collector retries a transient failure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Binance futures REST client shared by the exchange collectors
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BinanceFuturesClient {
    /// Per-request timeout
    const REQUEST_TIMEOUT_SECS: u64 = 10;

    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| network_error("binance", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GET a JSON endpoint, retrying transient failures per the retry policy
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.request_once(path, query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let wait = match &e {
                        FeedError::RateLimit {
                            retry_after: Some(secs),
                            ..
                        } => Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS)),
                        _ => self.retry.delay,
                    };
                    warn!(
                        path,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Binance request failed, retrying in {:?}",
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Binance request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| network_error("binance", e))?;

        read_json(response, "binance").await
    }
}
