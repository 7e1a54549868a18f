//! Constants for fxrate API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// RESPONSES
// ============================================================================

/// Message carried by every downstream-failure 503 body
pub const DOWNSTREAM_FAILURE_MESSAGE: &str = "Failed to retrieve rate for currency pair";

/// Response header carrying the correlation id of a downstream failure
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// VALIDATION
// ============================================================================

/// Minimum length of a currency code
pub const MIN_CURRENCY_CODE_LEN: usize = 3;

/// Maximum length of a currency code
pub const MAX_CURRENCY_CODE_LEN: usize = 10;

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Default token refresh buffer in seconds (refresh when this close to expiry)
pub const DEFAULT_TOKEN_REFRESH_BUFFER_SECS: u64 = 300;

/// Default interval of the proactive token check in seconds
pub const DEFAULT_TOKEN_CHECK_INTERVAL_SECS: u64 = 60;

/// OAuth grant type used against the token endpoint
pub const CLIENT_CREDENTIALS_GRANT: &str = "client_credentials";

// ============================================================================
// UPSTREAM HTTP
// ============================================================================

/// Default request timeout for upstream HTTP calls in seconds
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// QUEUE
// ============================================================================

/// Default visibility timeout of the in-process refresh queue in seconds
pub const DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_code_bounds() {
        assert!(MIN_CURRENCY_CODE_LEN <= MAX_CURRENCY_CODE_LEN);
        assert_eq!(MIN_CURRENCY_CODE_LEN, 3);
    }

    #[test]
    fn test_correlation_header_is_lowercase() {
        assert_eq!(CORRELATION_ID_HEADER, CORRELATION_ID_HEADER.to_lowercase());
    }
}
