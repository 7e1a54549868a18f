//! Tracing Subscriber Initialization
//!
//! JSON-formatted structured logs filtered through `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter applied when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "fxrate_api=debug,tower_http=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Emit JSON lines (default) or human-readable text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("FXRATE_SERVICE_NAME")
                .unwrap_or_else(|_| "fxrate-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("FXRATE_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            json: std::env::var("FXRATE_LOG_FORMAT")
                .map(|s| s.to_lowercase() != "text")
                .unwrap_or(true),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup, before any spans are created.
pub fn init_tracing(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        service_version = %config.service_version,
        environment = %config.environment,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER);
        assert!(filter.is_ok());
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = TelemetryConfig {
            json: false,
            ..Default::default()
        };
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
    }
}
