//! HTTP client for the authoritative rate source.

use async_trait::async_trait;
use chrono::Utc;
use fxrate_core::{FetchError, Pair, RateRecord, RateSource, Timestamp};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::FetchConfig;
use crate::error::{ApiError, ApiResult};

/// Wire shape of a successful rate response.
#[derive(Debug, Deserialize)]
struct RatePayload {
    rate: Option<f64>,
    source: Option<String>,
}

/// Decode a rate response body.
///
/// The response carries no timestamp of its own; `observed_at` is the time
/// of the fetch. Missing fields or a non-positive rate are malformed.
pub fn parse_rate_payload(
    pair: &Pair,
    body: &str,
    observed_at: Timestamp,
) -> Result<RateRecord, FetchError> {
    let malformed = |reason: String| FetchError::MalformedBody {
        pair: pair.to_string(),
        reason,
    };

    let payload: RatePayload =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let rate = payload
        .rate
        .ok_or_else(|| malformed("missing rate".to_string()))?;
    let source = payload
        .source
        .ok_or_else(|| malformed("missing source".to_string()))?;

    RateRecord::new(pair.clone(), rate, source, observed_at).map_err(|e| malformed(e.to_string()))
}

/// Fetches `GET {base_url}/{PAIR}` with a bearer token.
pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(config: &FetchConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, pair: &Pair) -> String {
        format!("{}/{}", self.base_url, pair)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(&self, pair: &Pair, token: &str) -> Result<Option<RateRecord>, FetchError> {
        let url = self.url_for(pair);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                pair: pair.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(pair = %pair, "Rate source has no data for pair");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                pair: pair.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Transport {
            pair: pair.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        parse_rate_payload(pair, &body, Utc::now()).map(Some)
    }
}

impl std::fmt::Debug for HttpRateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRateSource")
            .field("base_url", &self.base_url)
            .finish()
    }
}
