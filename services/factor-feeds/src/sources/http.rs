use crate::types::*;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Map an HTTP response onto a decoded body or a typed feed error
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    source_name: &str,
) -> Result<T> {
    let status = response.status();

    // Binance answers 418 once an IP keeps ignoring 429s
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(FeedError::RateLimit {
            source_name: source_name.to_string(),
            retry_after,
        });
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let text = response.text().await.unwrap_or_default();
        return Err(FeedError::Unauthorized(format!("{} ({}): {}", source_name, status, text)));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FeedError::Api {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| FeedError::InvalidResponse(format!("{}: {}", source_name, e)))
}

pub(crate) fn network_error(source_name: &str, err: reqwest::Error) -> FeedError {
    FeedError::Network(format!("{}: {}", source_name, err))
}
