//! Error Types for fxrate API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured client-facing errors
//! - ErrorCode enum for categorizing errors
//! - DownstreamFailure, the 503 body emitted when the authoritative fetch breaks
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fxrate_core::{CorrelationId, FxError, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::{CORRELATION_ID_HEADER, DOWNSTREAM_FAILURE_MESSAGE};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Required field is missing from request
    MissingField,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Shared cache could not be reached
    CacheUnavailable,

}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, constraint)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a CacheUnavailable error.
    pub fn cache_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Allows ApiError to be returned directly from Axum handlers:
/// ```ignore
/// async fn handler() -> Result<Json<Conversion>, ApiError> {
///     Err(ApiError::missing_field("from"))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// DOWNSTREAM FAILURE
// ============================================================================

/// 503 body returned when the authoritative fetch or the token endpoint
/// fails.
///
/// Distinct from an UNAVAILABLE conversion: this one means "fetch broke",
/// never "no data". Rendered with `Retry-After` and `X-Correlation-ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DownstreamFailure {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub timestamp: Timestamp,
    pub status: u16,
    pub message: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub correlation_id: CorrelationId,
    #[serde(skip)]
    pub retry_after: Duration,
}

impl DownstreamFailure {
    pub fn new(correlation_id: CorrelationId, retry_after: Duration) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            status: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            message: DOWNSTREAM_FAILURE_MESSAGE.to_string(),
            correlation_id,
            retry_after,
        }
    }
}

impl IntoResponse for DownstreamFailure {
    fn into_response(self) -> Response {
        let retry_after = HeaderValue::from(self.retry_after.as_secs());
        let correlation = HeaderValue::from_str(&self.correlation_id.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [
                (header::RETRY_AFTER, retry_after),
                (HeaderName::from_static(CORRELATION_ID_HEADER), correlation),
            ],
            Json(self),
        )
            .into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::InvalidValue { field, reason } => {
                ApiError::validation_failed(format!("Invalid value for '{}': {}", field, reason))
                    .with_details(serde_json::json!({ "field": field }))
            }
        }
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        match err {
            FxError::Validation(e) => e.into(),
            FxError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                ApiError::cache_unavailable("Rate cache operation failed")
            }
            other => {
                tracing::error!(error = %other, "Internal error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
