//! fxrate API Server Entry Point
//!
//! Loads configuration, wires the in-process cache and queue to the HTTP
//! rate source and token issuer, spawns the background jobs and serves the
//! Axum router until ctrl-c.

use std::sync::Arc;

use fxrate_api::telemetry::{init_tracing, TelemetryConfig};
use fxrate_api::{ApiError, ApiResult, AppConfig, AppServices, HttpRateSource, HttpTokenIssuer};
use fxrate_storage::{InMemoryCache, InMemoryQueue};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env();
    config.validate()?;

    let issuer = Arc::new(HttpTokenIssuer::new(&config.credentials, &config.fetch)?);
    let source = Arc::new(HttpRateSource::new(&config.fetch)?);
    let cache = Arc::new(InMemoryCache::new());
    let queue = Arc::new(InMemoryQueue::new(config.server.queue_visibility_timeout));

    let services = AppServices::new(config, cache, queue, issuer, source);
    let app = services.router();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs = services.spawn_jobs(shutdown_rx);

    let addr = services.config().server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting fxrate API server");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)));

    let _ = shutdown_tx.send(true);
    jobs.join().await;
    tracing::info!("fxrate API stopped");

    served
}
