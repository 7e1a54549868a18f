//! Refresh Scheduler Background Task
//!
//! Keeps popular pairs warm. Every tick:
//!
//! 1. Reads the `top_pairs_count` most used pairs from the usage ranking
//! 2. Keeps pairs with no in-flight marker whose last refresh is older than
//!    `refresh_interval` (or missing, or unparseable)
//! 3. Claims each kept pair with a set-if-absent in-flight marker
//! 4. Publishes a refresh job for every pair it claimed
//!
//! The claim in step 3 is the only coordination between scheduler
//! instances. A pair whose claim is lost to a concurrent tick is skipped.
//!
//! # Configuration
//!
//! ```rust
//! use fxrate_core::SchedulerConfig;
//! use std::time::Duration;
//!
//! let config = SchedulerConfig {
//!     top_pairs_count: 10,                         // Pairs considered per tick
//!     refresh_interval: Duration::from_secs(60),   // Minimum age before refresh
//!     in_flight_ttl: Duration::from_secs(120),     // Claim lifetime
//!     period: Duration::from_secs(30),             // Tick period
//! };
//! ```

use chrono::Utc;
use fxrate_core::{CacheError, Pair, RefreshJob, SchedulerConfig, Timestamp};
use fxrate_storage::{LastRefresh, MarkerStore, RefreshQueue, UsageTracker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::telemetry::metrics;

// ============================================================================
// ELIGIBILITY
// ============================================================================

/// Whether a pair with the given last-refresh marker is due at `now`.
///
/// Missing and unparseable markers are due. A marker in the future is not.
pub fn is_due(last: &LastRefresh, now: Timestamp, refresh_interval: Duration) -> bool {
    match last {
        LastRefresh::Never | LastRefresh::Malformed(_) => true,
        LastRefresh::At(at) => match chrono::Duration::from_std(refresh_interval) {
            Ok(interval) => now.signed_duration_since(*at) > interval,
            Err(_) => false,
        },
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pairs returned by the popularity ranking.
    pub candidates: usize,
    /// Pairs claimed and published, in ranking order.
    pub enqueued: Vec<Pair>,
    pub skipped_in_flight: usize,
    pub skipped_recent: usize,
    /// Claims lost to a concurrent tick.
    pub lost_claims: usize,
    /// Claimed pairs whose publish failed; their marker expires on its own.
    pub publish_failures: usize,
}

pub struct RefreshScheduler {
    usage: UsageTracker,
    markers: MarkerStore,
    queue: Arc<dyn RefreshQueue>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub fn new(
        usage: UsageTracker,
        markers: MarkerStore,
        queue: Arc<dyn RefreshQueue>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            usage,
            markers,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn tick(&self) -> Result<TickReport, CacheError> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick as of `now`.
    ///
    /// Cache failures abort the tick; the next scheduled tick retries.
    pub async fn tick_at(&self, now: Timestamp) -> Result<TickReport, CacheError> {
        let candidates = self.usage.top_n(self.config.top_pairs_count).await?;
        let mut report = TickReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for pair in candidates {
            if self.markers.is_in_flight(&pair).await? {
                report.skipped_in_flight += 1;
                continue;
            }

            let last = self.markers.last_refresh(&pair).await?;
            if !is_due(&last, now, self.config.refresh_interval) {
                report.skipped_recent += 1;
                continue;
            }
            if let LastRefresh::Malformed(raw) = &last {
                tracing::warn!(pair = %pair, value = %raw, "Unparseable last-refresh marker, treating as never refreshed");
            }

            if !self
                .markers
                .try_mark_in_flight(&pair, self.config.in_flight_ttl)
                .await?
            {
                report.lost_claims += 1;
                tracing::debug!(pair = %pair, "In-flight claim lost to concurrent tick");
                continue;
            }

            match self.queue.send(&RefreshJob::new(pair.clone())).await {
                Ok(()) => {
                    if let Some(m) = metrics() {
                        m.record_job_enqueued("scheduler");
                    }
                    report.enqueued.push(pair);
                }
                Err(e) => {
                    report.publish_failures += 1;
                    tracing::warn!(pair = %pair, error = %e, "Refresh job publish failed");
                }
            }
        }

        Ok(report)
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the scheduler task's lifetime.
#[derive(Debug, Default)]
pub struct RefreshSchedulerMetrics {
    /// Ticks completed without error
    pub ticks: AtomicU64,

    /// Ticks aborted by a cache error
    pub tick_errors: AtomicU64,

    /// Refresh jobs published
    pub jobs_enqueued: AtomicU64,

    /// Candidates skipped because a refresh is already in flight
    pub skipped_in_flight: AtomicU64,

    /// Candidates skipped because they were refreshed recently
    pub skipped_recent: AtomicU64,
}

impl RefreshSchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, report: &TickReport) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.jobs_enqueued
            .fetch_add(report.enqueued.len() as u64, Ordering::Relaxed);
        self.skipped_in_flight
            .fetch_add(report.skipped_in_flight as u64, Ordering::Relaxed);
        self.skipped_recent
            .fetch_add(report.skipped_recent as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RefreshSchedulerSnapshot {
        RefreshSchedulerSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            tick_errors: self.tick_errors.load(Ordering::Relaxed),
            jobs_enqueued: self.jobs_enqueued.load(Ordering::Relaxed),
            skipped_in_flight: self.skipped_in_flight.load(Ordering::Relaxed),
            skipped_recent: self.skipped_recent.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduler metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSchedulerSnapshot {
    pub ticks: u64,
    pub tick_errors: u64,
    pub jobs_enqueued: u64,
    pub skipped_in_flight: u64,
    pub skipped_recent: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run the scheduler every `config.period` until the shutdown signal.
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(refresh_scheduler_task(scheduler, shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn refresh_scheduler_task(
    scheduler: Arc<RefreshScheduler>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshSchedulerMetrics> {
    let metrics = Arc::new(RefreshSchedulerMetrics::new());

    let mut ticker = interval(scheduler.config().period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        period_secs = scheduler.config().period.as_secs(),
        top_pairs_count = scheduler.config().top_pairs_count,
        refresh_interval_ms = scheduler.config().refresh_interval.as_millis() as u64,
        in_flight_ttl_secs = scheduler.config().in_flight_ttl.as_secs(),
        "Refresh scheduler task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Refresh scheduler task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                run_tick(&scheduler, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        ticks = snapshot.ticks,
        tick_errors = snapshot.tick_errors,
        jobs_enqueued = snapshot.jobs_enqueued,
        "Refresh scheduler task completed"
    );

    metrics
}

async fn run_tick(scheduler: &RefreshScheduler, task_metrics: &RefreshSchedulerMetrics) {
    match scheduler.tick().await {
        Ok(report) => {
            task_metrics.record(&report);
            if let Some(m) = metrics() {
                m.record_scheduler_tick(true);
            }
            if report.enqueued.is_empty() {
                tracing::trace!(candidates = report.candidates, "Scheduler tick found nothing due");
            } else {
                tracing::info!(
                    candidates = report.candidates,
                    enqueued = report.enqueued.len(),
                    skipped_in_flight = report.skipped_in_flight,
                    skipped_recent = report.skipped_recent,
                    "Scheduler tick completed"
                );
            }
        }
        Err(e) => {
            task_metrics.tick_errors.fetch_add(1, Ordering::Relaxed);
            if let Some(m) = metrics() {
                m.record_scheduler_tick(false);
            }
            tracing::error!(error = %e, "Scheduler tick failed");
        }
    }
}
