//! REST API Routes Module
//!
//! Includes:
//! - Conversion endpoint at /convert and /api/v1/convert
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics at /metrics
//! - OpenAPI document at /openapi.json (with the `openapi` feature)
//! - CORS support for browser-based clients

pub mod convert;
pub mod health;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::map_response_body::MapResponseBodyLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::constants::CORRELATION_ID_HEADER;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use convert::create_router as convert_router;
pub use health::create_router as health_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ServerConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static(CORRELATION_ID_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// # Middleware Order (outer to inner)
/// 1. CORS - handles preflight requests
/// 2. HTTP tracing (`tower-http`)
/// 3. Observability - request span and Prometheus metrics
pub fn create_api_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .merge(convert::create_router())
        .nest("/api/v1", convert::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(build_cors_layer(config))
            .layer(MapResponseBodyLayer::new(axum::body::Body::new))
            .layer(TraceLayer::new_for_http())
            .layer(from_fn(observability_middleware)),
    )
}
