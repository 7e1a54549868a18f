//! fxrate Test Utilities
//!
//! Shared test infrastructure for the fxrate workspace:
//! - Scripted rate source and token issuer with call counters
//! - Cache and queue collaborators that always fail
//! - Fixtures for common scenarios
//! - Proptest generators for currency codes and amounts

pub use fxrate_core::{
    CacheError, CachedToken, CredentialError, FetchError, Pair, QueueError, RateRecord,
    RateSource, RefreshJob, Timestamp, TokenIssuer,
};
pub use fxrate_storage::{InMemoryCache, InMemoryQueue};

use async_trait::async_trait;
use fxrate_storage::{KeyValueCache, QueueMessage, ReceiptHandle, RefreshQueue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED RATE SOURCE
// ============================================================================

/// Scripted response for one pair.
#[derive(Debug, Clone)]
pub enum ScriptedRate {
    Found(RateRecord),
    NotFound,
    Fail(FetchError),
}

/// Rate source that answers from a per-pair script.
///
/// Unscripted pairs answer as not-found. Every call is counted, and the
/// token each call carried is recorded.
#[derive(Debug, Default)]
pub struct MockRateSource {
    script: Mutex<HashMap<Pair, ScriptedRate>>,
    calls: Mutex<Vec<(Pair, String)>>,
    delay: Option<Duration>,
}

impl MockRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_rate(self, record: RateRecord) -> Self {
        self.set(record.pair.clone(), ScriptedRate::Found(record));
        self
    }

    pub fn with_failure(self, pair: Pair, error: FetchError) -> Self {
        self.set(pair, ScriptedRate::Fail(error));
        self
    }

    pub fn set(&self, pair: Pair, response: ScriptedRate) {
        lock(&self.script).insert(pair, response);
    }

    /// Total number of fetches.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Fetches for one pair.
    pub fn calls_for(&self, pair: &Pair) -> usize {
        lock(&self.calls).iter().filter(|(p, _)| p == pair).count()
    }

    /// Tokens presented, in call order.
    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn fetch(&self, pair: &Pair, token: &str) -> Result<Option<RateRecord>, FetchError> {
        lock(&self.calls).push((pair.clone(), token.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.script).get(pair).cloned();
        match scripted {
            Some(ScriptedRate::Found(record)) => Ok(Some(record)),
            Some(ScriptedRate::Fail(error)) => Err(error),
            Some(ScriptedRate::NotFound) | None => Ok(None),
        }
    }
}

// ============================================================================
// SCRIPTED TOKEN ISSUER
// ============================================================================

/// Token issuer that counts issues and mints `token-<n>` values.
#[derive(Debug)]
pub struct MockTokenIssuer {
    issued: AtomicUsize,
    failing: AtomicBool,
    expires_in_secs: i64,
    delay: Option<Duration>,
}

impl Default for MockTokenIssuer {
    fn default() -> Self {
        Self {
            issued: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            expires_in_secs: 3600,
            delay: None,
        }
    }
}

impl MockTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_in_secs = secs;
        self
    }

    /// Sleep this long inside every issue, widening race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make subsequent issues fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Network round trips performed so far, including failed ones.
    pub fn issue_count(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for MockTokenIssuer {
    async fn issue(&self) -> Result<CachedToken, CredentialError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CredentialError::UnexpectedStatus { status: 503 });
        }
        Ok(CachedToken::issued_at(
            format!("token-{}", n),
            chrono::Utc::now(),
            self.expires_in_secs,
        ))
    }
}

// ============================================================================
// FAILING COLLABORATORS
// ============================================================================

/// Cache whose every operation reports the backend unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCache;

fn cache_down() -> CacheError {
    CacheError::Unavailable {
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl KeyValueCache for UnavailableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(cache_down())
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), CacheError> {
        Err(cache_down())
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(cache_down())
    }

    async fn set_if_absent_with_ttl(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        Err(cache_down())
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
        Err(cache_down())
    }

    async fn zincrement(&self, _key: &str, _member: &str, _delta: f64) -> Result<f64, CacheError> {
        Err(cache_down())
    }

    async fn zscore(&self, _key: &str, _member: &str) -> Result<Option<f64>, CacheError> {
        Err(cache_down())
    }

    async fn zrev_range(
        &self,
        _key: &str,
        _start: usize,
        _stop: usize,
    ) -> Result<Vec<String>, CacheError> {
        Err(cache_down())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(cache_down())
    }
}

/// Queue that fails every call and counts attempts.
#[derive(Debug, Default)]
pub struct UnavailableQueue {
    sends: AtomicUsize,
    receives: AtomicUsize,
}

impl UnavailableQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_attempts(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn receive_attempts(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshQueue for UnavailableQueue {
    async fn send(&self, job: &RefreshJob) -> Result<(), QueueError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::PublishFailed {
            pair: job.to_payload(),
            reason: "queue unreachable".to_string(),
        })
    }

    async fn receive_batch(
        &self,
        _max_messages: usize,
        _wait_time: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Unavailable {
            reason: "queue unreachable".to_string(),
        })
    }

    async fn ack(&self, receipts: &[ReceiptHandle]) -> Result<(), QueueError> {
        Err(QueueError::AckFailed {
            count: receipts.len(),
            reason: "queue unreachable".to_string(),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{DateTime, Utc};

    /// 2023-11-14T22:13:20Z
    pub fn fixed_timestamp() -> Timestamp {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    /// A valid record stamped with [`fixed_timestamp`].
    ///
    /// # Panics
    /// When `rate` is not positive and finite.
    pub fn rate_record(base: &str, quote: &str, rate: f64, source: &str) -> RateRecord {
        RateRecord::new(Pair::new(base, quote), rate, source, fixed_timestamp())
            .unwrap_or_else(|e| panic!("invalid fixture rate: {}", e))
    }

    /// USD/EUR at 0.92 from "ecb".
    pub fn usd_eur() -> RateRecord {
        rate_record("USD", "EUR", 0.92, "ecb")
    }

    /// GBP/JPY at 187.5 from "boe".
    pub fn gbp_jpy() -> RateRecord {
        rate_record("GBP", "JPY", 187.5, "boe")
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// ISO-style three-letter currency code in any case.
    pub fn arb_currency_code() -> impl Strategy<Value = String> {
        "[a-zA-Z]{3}"
    }

    /// Strictly positive, finite rate.
    pub fn arb_rate() -> impl Strategy<Value = f64> {
        0.0001f64..100_000.0
    }

    /// Finite amount, including zero and negatives.
    pub fn arb_amount() -> impl Strategy<Value = f64> {
        -1_000_000.0f64..1_000_000.0
    }
}
