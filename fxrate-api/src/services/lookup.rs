//! Lookup Coordinator
//!
//! Serves one conversion request with a tiered policy:
//!
//! 1. Rate cache hit: count usage, answer CACHED
//! 2. Miss: fetch from the authoritative source with a cached bearer token
//!    - found: count usage, answer FALLBACK (the result is not written back;
//!      the refresh worker is the only cache writer)
//!    - clean not-found: queue a refresh job, answer UNAVAILABLE
//!    - anything else: raise a downstream failure with a correlation id
//!
//! Usage increments run detached from the request; queue writes are awaited.
//! Neither ever fails the request.

use fxrate_core::{
    new_correlation_id, Conversion, ConversionState, CorrelationId, FetchError, LookupConfig,
    Pair, RateRecord, RateSource, RefreshJob,
};
use fxrate_storage::{RateCache, RefreshQueue, UsageTracker};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::CredentialCache;
use crate::telemetry::metrics;

/// Failure that must not be conflated with "no data".
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("Downstream fetch failed for {pair} (correlation id {correlation_id}): {source}")]
    Downstream {
        pair: Pair,
        correlation_id: CorrelationId,
        #[source]
        source: FetchError,
    },
}

impl LookupError {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            LookupError::Downstream { correlation_id, .. } => *correlation_id,
        }
    }
}

pub struct LookupCoordinator {
    rates: RateCache,
    usage: UsageTracker,
    queue: Arc<dyn RefreshQueue>,
    credentials: Arc<CredentialCache>,
    source: Arc<dyn RateSource>,
    config: LookupConfig,
}

impl LookupCoordinator {
    pub fn new(
        rates: RateCache,
        usage: UsageTracker,
        queue: Arc<dyn RefreshQueue>,
        credentials: Arc<CredentialCache>,
        source: Arc<dyn RateSource>,
        config: LookupConfig,
    ) -> Self {
        Self {
            rates,
            usage,
            queue,
            credentials,
            source,
            config,
        }
    }

    /// Seconds clients should wait after a downstream failure.
    pub fn retry_after(&self) -> Duration {
        self.config.retry_after
    }

    /// Convert `amount` of `from` into `to`.
    ///
    /// `from` and `to` are echoed back as given; the cache key is the
    /// normalized pair.
    pub async fn convert(
        &self,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<Conversion, LookupError> {
        let pair = Pair::new(from, to);

        match self.rates.get(&pair).await {
            Ok(Some(record)) => {
                self.track_usage(&pair);
                record_state(ConversionState::Cached);
                tracing::debug!(pair = %pair, rate = record.rate, "Rate served from cache");
                return Ok(Conversion::from_record(
                    from,
                    to,
                    amount,
                    &record,
                    ConversionState::Cached,
                ));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pair = %pair, error = %e, "Rate cache read failed, using fallback fetch");
            }
        }

        match self.fetch(&pair).await {
            Ok(Some(record)) => {
                record_fetch("found");
                self.track_usage(&pair);
                record_state(ConversionState::Fallback);
                tracing::info!(
                    pair = %pair,
                    rate = record.rate,
                    source = %record.source,
                    "Rate served from fallback fetch"
                );
                Ok(Conversion::from_record(
                    from,
                    to,
                    amount,
                    &record,
                    ConversionState::Fallback,
                ))
            }
            Ok(None) => {
                record_fetch("not_found");
                self.request_refresh(&pair).await;
                record_state(ConversionState::Unavailable);
                tracing::info!(pair = %pair, "Rate unavailable, refresh requested");
                Ok(Conversion::unavailable(from, to))
            }
            Err(source) => {
                record_fetch("error");
                let correlation_id = new_correlation_id();
                tracing::error!(
                    pair = %pair,
                    correlation_id = %correlation_id,
                    error = %source,
                    "Downstream rate fetch failed"
                );
                Err(LookupError::Downstream {
                    pair,
                    correlation_id,
                    source,
                })
            }
        }
    }

    async fn fetch(&self, pair: &Pair) -> Result<Option<RateRecord>, FetchError> {
        let token = self.credentials.get_token().await?;
        self.source.fetch(pair, token.token()).await
    }

    fn track_usage(&self, pair: &Pair) {
        let usage = self.usage.clone();
        let pair = pair.clone();
        tokio::spawn(async move {
            if let Err(e) = usage.increment(&pair).await {
                tracing::warn!(pair = %pair, error = %e, "Usage increment failed");
            }
        });
    }

    async fn request_refresh(&self, pair: &Pair) {
        match self.queue.send(&RefreshJob::new(pair.clone())).await {
            Ok(()) => {
                if let Some(m) = metrics() {
                    m.record_job_enqueued("lookup");
                }
            }
            Err(e) => {
                tracing::warn!(pair = %pair, error = %e, "Refresh job publish failed");
            }
        }
    }
}

fn record_state(state: ConversionState) {
    if let Some(m) = metrics() {
        m.record_conversion(state.as_str());
    }
}

fn record_fetch(outcome: &str) {
    if let Some(m) = metrics() {
        m.record_fallback_fetch(outcome);
    }
}
