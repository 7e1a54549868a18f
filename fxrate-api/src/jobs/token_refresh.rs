//! Proactive Token Refresh Task
//!
//! Checks the cached bearer token every `check_interval` and renews it once
//! it is inside the refresh buffer, so request paths rarely pay for an
//! issuer round trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::services::CredentialCache;

#[derive(Debug, Default)]
pub struct TokenRefreshMetrics {
    /// Checks performed
    pub checks: AtomicU64,

    /// Checks that renewed the token
    pub refreshes: AtomicU64,

    /// Renewals that failed
    pub failures: AtomicU64,
}

impl TokenRefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TokenRefreshSnapshot {
        TokenRefreshSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRefreshSnapshot {
    pub checks: u64,
    pub refreshes: u64,
    pub failures: u64,
}

pub async fn token_refresh_task(
    credentials: Arc<CredentialCache>,
    check_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<TokenRefreshMetrics> {
    let metrics = Arc::new(TokenRefreshMetrics::new());

    let mut ticker = interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = check_interval.as_secs(),
        refresh_buffer_secs = credentials.refresh_buffer().as_secs(),
        "Token refresh task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Token refresh task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                metrics.checks.fetch_add(1, Ordering::Relaxed);
                match credentials.proactive_refresh().await {
                    Ok(true) => {
                        metrics.refreshes.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        metrics.failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "Proactive token refresh failed");
                    }
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        checks = snapshot.checks,
        refreshes = snapshot.refreshes,
        failures = snapshot.failures,
        "Token refresh task completed"
    );

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrate_test_utils::MockTokenIssuer;

    #[tokio::test(start_paused = true)]
    async fn test_first_check_obtains_token_then_reuses_it() {
        let issuer = Arc::new(MockTokenIssuer::new());
        let credentials = Arc::new(CredentialCache::new(issuer.clone(), Duration::from_secs(300)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(token_refresh_task(
            credentials.clone(),
            Duration::from_secs(60),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.checks, 3);
        assert_eq!(snapshot.refreshes, 1);
        assert_eq!(issuer.issue_count(), 1);
        assert_eq!(credentials.current().map(|t| t.token().to_string()), Some("token-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_tokens_renewed_each_check() {
        // Tokens shorter than the buffer are always due for renewal.
        let issuer = Arc::new(MockTokenIssuer::new().with_expires_in(60));
        let credentials = Arc::new(CredentialCache::new(issuer.clone(), Duration::from_secs(300)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(token_refresh_task(
            credentials,
            Duration::from_secs(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.checks, 3);
        assert_eq!(snapshot.refreshes, 3);
        assert_eq!(issuer.issue_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_counted_and_task_keeps_running() {
        let issuer = Arc::new(MockTokenIssuer::new());
        issuer.set_failing(true);
        let credentials = Arc::new(CredentialCache::new(issuer.clone(), Duration::from_secs(300)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(token_refresh_task(
            credentials.clone(),
            Duration::from_secs(10),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(15)).await;
        issuer.set_failing(false);
        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.refreshes, 1);
        assert!(credentials.current().is_some());
    }
}
