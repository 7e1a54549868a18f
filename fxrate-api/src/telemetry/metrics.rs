//! Prometheus Metrics Definitions
//!
//! Defines all fxrate metrics with their labels and exposes a /metrics
//! endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use fxrate_core::Timestamp;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<FxMetrics>> = Lazy::new(FxMetrics::new);

/// The registered metrics, or `None` when registration failed.
pub fn metrics() -> Option<&'static FxMetrics> {
    METRICS.as_ref().ok()
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Container for all fxrate metrics.
#[derive(Clone)]
pub struct FxMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Conversion results - labels: state
    pub conversions_total: CounterVec,

    /// Fallback fetches on cache miss - labels: outcome (found, not_found, error)
    pub fallback_fetches_total: CounterVec,

    /// Token refresh attempts - labels: status (success, failure)
    pub token_refreshes_total: CounterVec,

    /// Unix time at which the cached bearer token expires
    pub token_expiry_timestamp_seconds: Gauge,

    /// Refresh jobs published - labels: origin (scheduler, lookup)
    pub refresh_jobs_enqueued_total: CounterVec,

    /// Scheduler ticks - labels: outcome (ok, error)
    pub scheduler_ticks_total: CounterVec,

    /// Worker batches - labels: outcome (acked, failed)
    pub worker_batches_total: CounterVec,

    /// Rate records written by the worker
    pub worker_rates_written_total: CounterVec,
}

impl FxMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "fxrate_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "fxrate_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            conversions_total: register_counter_vec!(
                "fxrate_conversions_total",
                "Conversion results by state",
                &["state"]
            )
            .map_err(|e| registration_error("conversions_total", e))?,

            fallback_fetches_total: register_counter_vec!(
                "fxrate_fallback_fetches_total",
                "Authoritative fetches performed on cache miss",
                &["outcome"]
            )
            .map_err(|e| registration_error("fallback_fetches_total", e))?,

            token_refreshes_total: register_counter_vec!(
                "fxrate_token_refreshes_total",
                "Bearer token refresh attempts",
                &["status"]
            )
            .map_err(|e| registration_error("token_refreshes_total", e))?,

            token_expiry_timestamp_seconds: register_gauge!(
                "fxrate_token_expiry_timestamp_seconds",
                "Unix time at which the cached bearer token expires"
            )
            .map_err(|e| registration_error("token_expiry_timestamp_seconds", e))?,

            refresh_jobs_enqueued_total: register_counter_vec!(
                "fxrate_refresh_jobs_enqueued_total",
                "Refresh jobs published to the queue",
                &["origin"]
            )
            .map_err(|e| registration_error("refresh_jobs_enqueued_total", e))?,

            scheduler_ticks_total: register_counter_vec!(
                "fxrate_scheduler_ticks_total",
                "Refresh scheduler ticks",
                &["outcome"]
            )
            .map_err(|e| registration_error("scheduler_ticks_total", e))?,

            worker_batches_total: register_counter_vec!(
                "fxrate_worker_batches_total",
                "Refresh worker batches",
                &["outcome"]
            )
            .map_err(|e| registration_error("worker_batches_total", e))?,

            worker_rates_written_total: register_counter_vec!(
                "fxrate_worker_rates_written_total",
                "Rate records written by the refresh worker",
                &["source"]
            )
            .map_err(|e| registration_error("worker_rates_written_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_conversion(&self, state: &str) {
        self.conversions_total.with_label_values(&[state]).inc();
    }

    pub fn record_fallback_fetch(&self, outcome: &str) {
        self.fallback_fetches_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_token_refresh(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.token_refreshes_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn set_token_expiry(&self, expires_at: Timestamp) {
        self.token_expiry_timestamp_seconds
            .set(expires_at.timestamp() as f64);
    }

    pub fn record_job_enqueued(&self, origin: &str) {
        self.refresh_jobs_enqueued_total
            .with_label_values(&[origin])
            .inc();
    }

    pub fn record_scheduler_tick(&self, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.scheduler_ticks_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_worker_batch(&self, acked: bool) {
        let outcome = if acked { "acked" } else { "failed" };
        self.worker_batches_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_rate_written(&self, source: &str) {
        self.worker_rates_written_total
            .with_label_values(&[source])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so fxrate metrics are present on the first scrape.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
