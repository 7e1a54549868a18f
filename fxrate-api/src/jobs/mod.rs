//! Background Jobs for the fxrate API
//!
//! Long-running tasks spawned at startup:
//!
//! - `refresh_scheduler`: queues refresh jobs for popular pairs that are due
//! - `refresh_worker`: consumes refresh jobs and writes fresh rates to the cache
//! - `token_refresh`: renews the bearer token before it expires
//!
//! # Usage
//!
//! Every task takes a shutdown receiver and returns its metrics when it
//! stops:
//!
//! ```ignore
//! use fxrate_api::jobs::refresh_scheduler_task;
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(refresh_scheduler_task(scheduler, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

pub mod refresh_scheduler;
pub mod refresh_worker;
pub mod token_refresh;

pub use refresh_scheduler::{
    is_due, refresh_scheduler_task, RefreshScheduler, RefreshSchedulerMetrics,
    RefreshSchedulerSnapshot, TickReport,
};
pub use refresh_worker::{
    refresh_worker_task, BatchReport, RefreshWorker, RefreshWorkerMetrics, RefreshWorkerSnapshot,
    WorkerError,
};
pub use token_refresh::{token_refresh_task, TokenRefreshMetrics, TokenRefreshSnapshot};
