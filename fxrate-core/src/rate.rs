//! Rate records, refresh jobs and conversion results.

use crate::{Pair, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// A cached exchange rate for one pair.
///
/// Rate is always strictly positive and finite; use [`RateRecord::new`] to
/// build one from untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub pair: Pair,
    pub rate: f64,
    pub source: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub observed_at: Timestamp,
}

impl RateRecord {
    pub fn new(
        pair: Pair,
        rate: f64,
        source: impl Into<String>,
        observed_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "rate".to_string(),
                reason: format!("must be positive and finite, got {}", rate),
            });
        }
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "source".to_string(),
            });
        }
        Ok(Self {
            pair,
            rate,
            source,
            observed_at,
        })
    }

    /// `amount * rate`, the only computation the service performs.
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate
    }
}

/// A request to refresh one pair, carried on the queue as the bare pair
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshJob {
    pub pair: Pair,
}

impl RefreshJob {
    pub fn new(pair: Pair) -> Self {
        Self { pair }
    }

    /// Queue payload for this job.
    pub fn to_payload(&self) -> String {
        self.pair.to_string()
    }

    /// Parse a queue payload. Blank payloads yield `None`.
    pub fn from_payload(body: &str) -> Option<Self> {
        Pair::from_normalized(body).map(Self::new)
    }
}

/// Where a conversion's rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionState {
    /// Served from the shared rate cache.
    Cached,
    /// Fetched from the authoritative source on a cache miss.
    Fallback,
    /// Neither source had data; a refresh job was queued.
    Unavailable,
}

impl ConversionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionState::Cached => "CACHED",
            ConversionState::Fallback => "FALLBACK",
            ConversionState::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Result of a conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub converted_amount: f64,
    pub source: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub timestamp: Option<Timestamp>,
    pub state: ConversionState,
}

impl Conversion {
    /// Build a CACHED or FALLBACK result from a rate record.
    pub fn from_record(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: f64,
        record: &RateRecord,
        state: ConversionState,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rate: record.rate,
            converted_amount: record.convert(amount),
            source: Some(record.source.clone()),
            timestamp: Some(record.observed_at),
            state,
        }
    }

    /// Zeroed UNAVAILABLE result.
    pub fn unavailable(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rate: 0.0,
            converted_amount: 0.0,
            source: None,
            timestamp: None,
            state: ConversionState::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state != ConversionState::Unavailable
    }
}
