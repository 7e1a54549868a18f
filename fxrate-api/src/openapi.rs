//! OpenAPI Specification for the fxrate API
//!
//! Generated by utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, DownstreamFailure, ErrorCode};
use crate::routes::{convert, health};
use crate::telemetry::metrics;
use fxrate_core::{Conversion, ConversionState};

/// OpenAPI document for the fxrate API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fxrate API",
        description = "Currency conversion backed by a shared rate cache with background refresh",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Conversion", description = "Currency conversion"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        convert::convert,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        Conversion,
        ConversionState,
        ApiError,
        ErrorCode,
        DownstreamFailure,
        health::HealthResponse,
        health::HealthStatus,
        health::HealthDetails,
        health::ComponentHealth,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Serialize the document as pretty-printed JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}
