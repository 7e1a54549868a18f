//! Refresh Worker Background Task
//!
//! Consumes refresh jobs from the queue in batches. For each batch it:
//!
//! 1. Obtains one bearer token from the credential cache
//! 2. Fetches every distinct pair in the batch from the authoritative source
//! 3. Writes found records to the rate cache (clean not-founds write nothing)
//! 4. Stamps the last-refresh marker for every pair in the batch
//! 5. Acknowledges the whole batch
//!
//! Any failure in steps 1-4 leaves the batch unacknowledged, so the queue
//! redelivers it once the visibility timeout lapses. Processing is
//! idempotent: a redelivered batch overwrites the same keys.

use chrono::Utc;
use fxrate_core::{CacheError, FetchError, Pair, QueueError, RateSource, RefreshJob, WorkerConfig};
use fxrate_storage::{MarkerStore, QueueMessage, RateCache, ReceiptHandle, RefreshQueue};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::services::CredentialCache;
use crate::telemetry::metrics;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Outcome of one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub messages: usize,
    /// Distinct pairs fetched.
    pub pairs: usize,
    pub written: usize,
    pub not_found: usize,
    /// Blank payloads dropped without a fetch.
    pub skipped: usize,
}

pub struct RefreshWorker {
    queue: Arc<dyn RefreshQueue>,
    rates: RateCache,
    markers: MarkerStore,
    credentials: Arc<CredentialCache>,
    source: Arc<dyn RateSource>,
    config: WorkerConfig,
}

impl RefreshWorker {
    pub fn new(
        queue: Arc<dyn RefreshQueue>,
        rates: RateCache,
        markers: MarkerStore,
        credentials: Arc<CredentialCache>,
        source: Arc<dyn RateSource>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            rates,
            markers,
            credentials,
            source,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Long-poll the queue for the next batch.
    pub async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        self.queue
            .receive_batch(self.config.max_messages, self.config.wait_time)
            .await
    }

    /// Fetch and store every pair named by the batch. Does not acknowledge.
    pub async fn handle_batch(&self, messages: &[QueueMessage]) -> Result<BatchReport, WorkerError> {
        let mut report = BatchReport {
            messages: messages.len(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        let mut pairs: Vec<Pair> = Vec::with_capacity(messages.len());
        for message in messages {
            match RefreshJob::from_payload(&message.body) {
                Some(job) => {
                    if seen.insert(job.pair.clone()) {
                        pairs.push(job.pair);
                    }
                }
                None => {
                    report.skipped += 1;
                    tracing::warn!(receipt = %message.receipt, "Blank refresh job payload dropped");
                }
            }
        }
        report.pairs = pairs.len();

        if pairs.is_empty() {
            return Ok(report);
        }

        let token = self
            .credentials
            .get_token()
            .await
            .map_err(FetchError::from)?;
        let outcomes = self.source.fetch_batch(&pairs, token.token()).await?;

        for (pair, record) in &outcomes {
            match record {
                Some(record) => {
                    self.rates.put(record).await?;
                    report.written += 1;
                    if let Some(m) = metrics() {
                        m.record_rate_written(&record.source);
                    }
                    tracing::debug!(pair = %pair, rate = record.rate, source = %record.source, "Rate refreshed");
                }
                None => {
                    report.not_found += 1;
                    tracing::debug!(pair = %pair, "Source has no rate for pair");
                }
            }
        }

        let now = Utc::now();
        for pair in &pairs {
            self.markers.record_refresh(pair, now).await?;
        }

        Ok(report)
    }

    /// Process a received batch and acknowledge it on success.
    ///
    /// A failed batch is left unacknowledged for redelivery. A failed
    /// acknowledgement is logged; the batch is redelivered and reprocessed.
    pub async fn complete(&self, messages: Vec<QueueMessage>) -> Result<BatchReport, WorkerError> {
        let report = match self.handle_batch(&messages).await {
            Ok(report) => report,
            Err(e) => {
                if let Some(m) = metrics() {
                    m.record_worker_batch(false);
                }
                tracing::warn!(
                    messages = messages.len(),
                    error = %e,
                    "Refresh batch failed, leaving for redelivery"
                );
                return Err(e);
            }
        };

        let receipts: Vec<ReceiptHandle> = messages.into_iter().map(|m| m.receipt).collect();
        if let Err(e) = self.queue.ack(&receipts).await {
            tracing::warn!(count = receipts.len(), error = %e, "Refresh batch ack failed");
        }
        if let Some(m) = metrics() {
            m.record_worker_batch(true);
        }

        tracing::info!(
            messages = report.messages,
            pairs = report.pairs,
            written = report.written,
            not_found = report.not_found,
            skipped = report.skipped,
            "Refresh batch completed"
        );
        Ok(report)
    }

    /// Receive one batch and complete it. An empty receive returns `None`.
    pub async fn drain_once(&self) -> Result<Option<BatchReport>, WorkerError> {
        let messages = self.receive().await?;
        if messages.is_empty() {
            return Ok(None);
        }
        self.complete(messages).await.map(Some)
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the worker task's lifetime.
#[derive(Debug, Default)]
pub struct RefreshWorkerMetrics {
    /// Batches processed and acknowledged
    pub batches_completed: AtomicU64,

    /// Batches left for redelivery
    pub batches_failed: AtomicU64,

    /// Rate records written
    pub rates_written: AtomicU64,

    /// Failed receives
    pub receive_errors: AtomicU64,
}

impl RefreshWorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RefreshWorkerSnapshot {
        RefreshWorkerSnapshot {
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            rates_written: self.rates_written.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshWorkerSnapshot {
    pub batches_completed: u64,
    pub batches_failed: u64,
    pub rates_written: u64,
    pub receive_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Poll the queue until the shutdown signal.
///
/// The receive long-poll is abandoned on shutdown; a batch already received
/// is processed to completion first.
pub async fn refresh_worker_task(
    worker: Arc<RefreshWorker>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshWorkerMetrics> {
    let metrics = Arc::new(RefreshWorkerMetrics::new());

    tracing::info!(
        max_messages = worker.config().max_messages,
        wait_secs = worker.config().wait_time.as_secs(),
        "Refresh worker task started"
    );

    while !*shutdown_rx.borrow() {
        let received = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            received = worker.receive() => received,
        };

        match received {
            Ok(messages) if messages.is_empty() => {}
            Ok(messages) => match worker.complete(messages).await {
                Ok(report) => {
                    metrics.batches_completed.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .rates_written
                        .fetch_add(report.written as u64, Ordering::Relaxed);
                }
                Err(_) => {
                    metrics.batches_failed.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(e) => {
                metrics.receive_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, backoff_ms = worker.config().error_backoff.as_millis() as u64, "Refresh queue receive failed");
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(worker.config().error_backoff) => {}
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        batches_completed = snapshot.batches_completed,
        batches_failed = snapshot.batches_failed,
        rates_written = snapshot.rates_written,
        receive_errors = snapshot.receive_errors,
        "Refresh worker task completed"
    );

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrate_core::CredentialError;
    use fxrate_storage::{InMemoryCache, InMemoryQueue, LastRefresh};
    use fxrate_test_utils::{fixtures, MockRateSource, MockTokenIssuer, ScriptedRate, UnavailableQueue};
    use std::time::Duration;

    struct Harness {
        cache: Arc<InMemoryCache>,
        queue: Arc<InMemoryQueue>,
        source: Arc<MockRateSource>,
        issuer: Arc<MockTokenIssuer>,
        worker: RefreshWorker,
    }

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            max_messages: 10,
            wait_time: Duration::ZERO,
            error_backoff: Duration::from_millis(100),
        }
    }

    impl Harness {
        fn new(source: MockRateSource) -> Self {
            let cache = Arc::new(InMemoryCache::new());
            let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(30)));
            let source = Arc::new(source);
            let issuer = Arc::new(MockTokenIssuer::new());
            let credentials = Arc::new(CredentialCache::new(
                issuer.clone(),
                Duration::from_secs(300),
            ));
            let worker = RefreshWorker::new(
                queue.clone(),
                RateCache::new(cache.clone()),
                MarkerStore::new(cache.clone()),
                credentials,
                source.clone(),
                worker_config(),
            );
            Self {
                cache,
                queue,
                source,
                issuer,
                worker,
            }
        }

        async fn enqueue(&self, pair: &Pair) {
            self.queue.send(&RefreshJob::new(pair.clone())).await.unwrap();
        }

        fn rates(&self) -> RateCache {
            RateCache::new(self.cache.clone())
        }

        fn markers(&self) -> MarkerStore {
            MarkerStore::new(self.cache.clone())
        }
    }

    #[tokio::test]
    async fn test_batch_writes_found_rates_and_acks() {
        let usd_eur = fixtures::usd_eur();
        let h = Harness::new(MockRateSource::new().with_rate(usd_eur.clone()));
        let missing = Pair::new("XAU", "CHF");
        h.enqueue(&usd_eur.pair).await;
        h.enqueue(&missing).await;

        let report = h.worker.drain_once().await.unwrap().unwrap();

        assert_eq!(
            report,
            BatchReport {
                messages: 2,
                pairs: 2,
                written: 1,
                not_found: 1,
                skipped: 0,
            }
        );
        assert_eq!(h.rates().get(&usd_eur.pair).await.unwrap(), Some(usd_eur.clone()));
        assert_eq!(h.rates().get(&missing).await.unwrap(), None);
        assert!(matches!(
            h.markers().last_refresh(&usd_eur.pair).await.unwrap(),
            LastRefresh::At(_)
        ));
        assert!(matches!(
            h.markers().last_refresh(&missing).await.unwrap(),
            LastRefresh::At(_)
        ));
        assert_eq!(h.queue.ready_len().await, 0);
        assert_eq!(h.queue.in_flight_len().await, 0);
        assert_eq!(h.source.tokens_seen(), vec!["token-1", "token-1"]);
    }

    #[tokio::test]
    async fn test_empty_receive_returns_none() {
        let h = Harness::new(MockRateSource::new());
        assert_eq!(h.worker.drain_once().await.unwrap(), None);
        assert_eq!(h.issuer.issue_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_pairs_fetched_once() {
        let usd_eur = fixtures::usd_eur();
        let h = Harness::new(MockRateSource::new().with_rate(usd_eur.clone()));
        h.enqueue(&usd_eur.pair).await;
        h.enqueue(&usd_eur.pair).await;

        let report = h.worker.drain_once().await.unwrap().unwrap();
        assert_eq!(report.messages, 2);
        assert_eq!(report.pairs, 1);
        assert_eq!(h.source.calls_for(&usd_eur.pair), 1);
        assert_eq!(h.queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_redelivered_job_is_idempotent() {
        let usd_eur = fixtures::usd_eur();
        let h = Harness::new(MockRateSource::new().with_rate(usd_eur.clone()));

        h.enqueue(&usd_eur.pair).await;
        h.worker.drain_once().await.unwrap();
        h.enqueue(&usd_eur.pair).await;
        h.worker.drain_once().await.unwrap();

        assert_eq!(h.rates().get(&usd_eur.pair).await.unwrap(), Some(usd_eur));
        assert_eq!(h.cache.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_leaves_batch_for_redelivery() {
        let usd_eur = fixtures::usd_eur();
        let h = Harness::new(MockRateSource::new().with_failure(
            usd_eur.pair.clone(),
            FetchError::UnexpectedStatus {
                pair: usd_eur.pair.to_string(),
                status: 500,
            },
        ));
        h.enqueue(&usd_eur.pair).await;

        let err = h.worker.drain_once().await.unwrap_err();
        assert!(matches!(err, WorkerError::Fetch(FetchError::UnexpectedStatus { status: 500, .. })));
        assert_eq!(h.queue.in_flight_len().await, 1);
        assert_eq!(h.markers().last_refresh(&usd_eur.pair).await.unwrap(), LastRefresh::Never);

        h.source.set(usd_eur.pair.clone(), ScriptedRate::Found(usd_eur.clone()));
        assert_eq!(h.worker.drain_once().await.unwrap(), None);

        tokio::time::advance(Duration::from_secs(31)).await;
        let messages = h.worker.receive().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].receive_count, 2);

        let report = h.worker.complete(messages).await.unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(h.rates().get(&usd_eur.pair).await.unwrap(), Some(usd_eur));
        assert_eq!(h.queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_credential_failure_leaves_batch_unacked() {
        let h = Harness::new(MockRateSource::new().with_rate(fixtures::usd_eur()));
        h.issuer.set_failing(true);
        h.enqueue(&fixtures::usd_eur().pair).await;

        let err = h.worker.drain_once().await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Fetch(FetchError::Credential(CredentialError::UnexpectedStatus { status: 503 }))
        ));
        assert_eq!(h.source.call_count(), 0);
        assert_eq!(h.queue.in_flight_len().await, 1);
    }

    #[tokio::test]
    async fn test_blank_payloads_skipped_and_acked() {
        let h = Harness::new(MockRateSource::new());
        let messages = vec![QueueMessage {
            receipt: "r-1".to_string(),
            body: "   ".to_string(),
            receive_count: 1,
        }];

        let report = h.worker.complete(messages).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.pairs, 0);
        assert_eq!(h.issuer.issue_count(), 0);
        assert_eq!(h.source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_processes_jobs_until_shutdown() {
        let usd_eur = fixtures::usd_eur();
        let h = Harness::new(MockRateSource::new().with_rate(usd_eur.clone()));
        h.enqueue(&usd_eur.pair).await;
        let cache = h.cache.clone();
        let worker = Arc::new(RefreshWorker::new(
            h.queue.clone(),
            RateCache::new(cache.clone()),
            MarkerStore::new(cache.clone()),
            Arc::new(CredentialCache::new(h.issuer.clone(), Duration::from_secs(300))),
            h.source.clone(),
            WorkerConfig {
                wait_time: Duration::from_secs(20),
                ..worker_config()
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(refresh_worker_task(worker, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.batches_completed, 1);
        assert_eq!(snapshot.rates_written, 1);
        assert_eq!(RateCache::new(cache).get(&usd_eur.pair).await.unwrap(), Some(usd_eur));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_backs_off_on_receive_errors() {
        let queue = Arc::new(UnavailableQueue::new());
        let cache = Arc::new(InMemoryCache::new());
        let worker = Arc::new(RefreshWorker::new(
            queue.clone(),
            RateCache::new(cache.clone()),
            MarkerStore::new(cache),
            Arc::new(CredentialCache::new(
                Arc::new(MockTokenIssuer::new()),
                Duration::from_secs(300),
            )),
            Arc::new(MockRateSource::new()),
            worker_config(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(refresh_worker_task(worker, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(350)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert!(snapshot.receive_errors >= 3 && snapshot.receive_errors <= 5);
        assert_eq!(queue.receive_attempts() as u64, snapshot.receive_errors);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_during_long_poll() {
        let h = Harness::new(MockRateSource::new());
        let worker = Arc::new(RefreshWorker::new(
            h.queue.clone(),
            RateCache::new(h.cache.clone()),
            MarkerStore::new(h.cache.clone()),
            Arc::new(CredentialCache::new(h.issuer.clone(), Duration::from_secs(300))),
            h.source.clone(),
            WorkerConfig {
                wait_time: Duration::from_secs(20),
                ..worker_config()
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(refresh_worker_task(worker, shutdown_rx));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let started = tokio::time::Instant::now();
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
