//! Currency Conversion Endpoint
//!
//! `GET /convert?from=USD&to=EUR&amount=100`
//!
//! - 200 with the conversion for CACHED and FALLBACK results
//! - 503 with the same shape, zeroed, for UNAVAILABLE
//! - 503 downstream-failure body with `Retry-After` when the authoritative
//!   fetch or the token endpoint fails
//! - 400 for invalid input

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use fxrate_core::Conversion;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult, DownstreamFailure};
use crate::services::{LookupCoordinator, LookupError};
use crate::state::AppState;
use crate::validation::{ValidateCurrencyCode, ValidateFinite, ValidateNonEmpty};

// ============================================================================
// REQUEST
// ============================================================================

/// Raw query string. Fields are optional so missing input surfaces as a
/// structured 400 rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ConvertQuery {
    /// Base currency code
    pub from: Option<String>,
    /// Quote currency code
    pub to: Option<String>,
    /// Amount in the base currency
    pub amount: Option<String>,
}

/// Validated conversion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

impl ConvertQuery {
    pub fn validate(self) -> ApiResult<ConvertRequest> {
        self.from.validate_non_empty("from")?;
        self.to.validate_non_empty("to")?;
        self.amount.validate_non_empty("amount")?;

        let from = self.from.unwrap_or_default().trim().to_string();
        let to = self.to.unwrap_or_default().trim().to_string();
        from.validate_currency_code("from")?;
        to.validate_currency_code("to")?;

        let amount: f64 = self
            .amount
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| ApiError::invalid_format("amount", "a decimal number"))?;
        amount.validate_finite("amount")?;

        Ok(ConvertRequest { from, to, amount })
    }
}

// ============================================================================
// HANDLER
// ============================================================================

/// GET /convert - Convert an amount between two currencies
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/convert",
    tag = "Conversion",
    params(ConvertQuery),
    responses(
        (status = 200, description = "Rate served from cache or fallback fetch", body = Conversion),
        (status = 400, description = "Invalid input", body = ApiError),
        (status = 503, description = "Rate unavailable (refresh queued) or downstream failure", body = DownstreamFailure),
    ),
))]
pub async fn convert(
    State(coordinator): State<Arc<LookupCoordinator>>,
    Query(query): Query<ConvertQuery>,
) -> Response {
    let request = match query.validate() {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match coordinator
        .convert(&request.from, &request.to, request.amount)
        .await
    {
        Ok(conversion) => conversion_response(conversion),
        Err(e) => downstream_response(&e, &coordinator),
    }
}

fn downstream_response(error: &LookupError, coordinator: &LookupCoordinator) -> Response {
    DownstreamFailure::new(error.correlation_id(), coordinator.retry_after()).into_response()
}

fn conversion_response(conversion: Conversion) -> Response {
    let status = if conversion.is_available() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(conversion)).into_response()
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/convert", get(convert))
}
