//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/ready - Cache connectivity check
//! - /health/live - Process alive check
//!
//! An unreachable cache reports `degraded` with a 200: conversions still
//! succeed through the fallback fetch path.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use fxrate_storage::KeyValueCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub cache: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct HealthState {
    pub cache: Arc<dyn KeyValueCache>,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            cache,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (cache connectivity)
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready; status is degraded when the cache is unreachable", body = HealthResponse),
    ),
))]
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let cache_health = match check_cache(state.cache.as_ref()).await {
        Ok(latency) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe: cache unreachable");
            ComponentHealth {
                status: HealthStatus::Degraded,
                latency_ms: None,
                error: Some(e),
            }
        }
    };

    let response = HealthResponse {
        status: cache_health.status,
        message: None,
        details: Some(HealthDetails {
            cache: cache_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    (StatusCode::OK, Json(response))
}

async fn check_cache(cache: &dyn KeyValueCache) -> Result<u64, String> {
    let start = Instant::now();
    match cache.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Cache check failed: {}", e)),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
