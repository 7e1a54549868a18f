//! fxrate Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the API
//! layer and its background jobs.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, FxMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig, DEFAULT_LOG_FILTER};
