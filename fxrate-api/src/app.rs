//! Service wiring.
//!
//! Builds every component from an [`AppConfig`] and the four collaborators
//! (cache, queue, token issuer, rate source), and spawns the background
//! jobs under one shutdown channel.

use std::sync::Arc;

use axum::Router;
use fxrate_core::{RateSource, TokenIssuer};
use fxrate_storage::{KeyValueCache, MarkerStore, RateCache, RefreshQueue, UsageTracker};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::jobs::{
    refresh_scheduler_task, refresh_worker_task, token_refresh_task, RefreshScheduler,
    RefreshSchedulerMetrics, RefreshWorker, RefreshWorkerMetrics, TokenRefreshMetrics,
};
use crate::routes::create_api_router;
use crate::services::{CredentialCache, LookupCoordinator};
use crate::state::AppState;

/// Every long-lived component of the service.
pub struct AppServices {
    config: AppConfig,
    pub cache: Arc<dyn KeyValueCache>,
    pub queue: Arc<dyn RefreshQueue>,
    pub credentials: Arc<CredentialCache>,
    pub coordinator: Arc<LookupCoordinator>,
    pub scheduler: Arc<RefreshScheduler>,
    pub worker: Arc<RefreshWorker>,
}

impl AppServices {
    pub fn new(
        config: AppConfig,
        cache: Arc<dyn KeyValueCache>,
        queue: Arc<dyn RefreshQueue>,
        issuer: Arc<dyn TokenIssuer>,
        source: Arc<dyn RateSource>,
    ) -> Self {
        let credentials = Arc::new(CredentialCache::new(
            issuer,
            config.credentials.refresh_buffer,
        ));

        let coordinator = Arc::new(LookupCoordinator::new(
            RateCache::new(cache.clone()),
            UsageTracker::new(cache.clone()),
            queue.clone(),
            credentials.clone(),
            source.clone(),
            config.lookup.clone(),
        ));

        let scheduler = Arc::new(RefreshScheduler::new(
            UsageTracker::new(cache.clone()),
            MarkerStore::new(cache.clone()),
            queue.clone(),
            config.scheduler.clone(),
        ));

        let worker = Arc::new(RefreshWorker::new(
            queue.clone(),
            RateCache::new(cache.clone()),
            MarkerStore::new(cache.clone()),
            credentials.clone(),
            source,
            config.worker.clone(),
        ));

        Self {
            config,
            cache,
            queue,
            credentials,
            coordinator,
            scheduler,
            worker,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// HTTP router over these services.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.coordinator.clone(), self.cache.clone());
        create_api_router(state, &self.config.server)
    }

    /// Spawn the scheduler, worker and token-refresh tasks.
    pub fn spawn_jobs(&self, shutdown_rx: watch::Receiver<bool>) -> BackgroundJobs {
        BackgroundJobs {
            scheduler: tokio::spawn(refresh_scheduler_task(
                self.scheduler.clone(),
                shutdown_rx.clone(),
            )),
            worker: tokio::spawn(refresh_worker_task(self.worker.clone(), shutdown_rx.clone())),
            token_refresh: tokio::spawn(token_refresh_task(
                self.credentials.clone(),
                self.config.credentials.check_interval,
                shutdown_rx,
            )),
        }
    }
}

/// Handles of the spawned background tasks.
pub struct BackgroundJobs {
    pub scheduler: JoinHandle<Arc<RefreshSchedulerMetrics>>,
    pub worker: JoinHandle<Arc<RefreshWorkerMetrics>>,
    pub token_refresh: JoinHandle<Arc<TokenRefreshMetrics>>,
}

impl BackgroundJobs {
    /// Wait for every task to stop. Call after signalling shutdown.
    pub async fn join(self) {
        if let Err(e) = self.scheduler.await {
            tracing::error!(error = %e, "Refresh scheduler task panicked");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Refresh worker task panicked");
        }
        if let Err(e) = self.token_refresh.await {
            tracing::error!(error = %e, "Token refresh task panicked");
        }
    }
}
