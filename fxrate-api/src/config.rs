//! API Configuration Module
//!
//! Configuration for the upstream clients, the credential cache and the HTTP
//! server. Component configs for lookup, scheduling and the worker live in
//! `fxrate-core`; [`AppConfig`] bundles everything the binary needs. All
//! values are loaded from environment variables with development defaults.

use fxrate_core::{ConfigError, FxError, FxResult, LookupConfig, SchedulerConfig, WorkerConfig};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_PORT,
    DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS, DEFAULT_TOKEN_CHECK_INTERVAL_SECS,
    DEFAULT_TOKEN_REFRESH_BUFFER_SECS, DEFAULT_UPSTREAM_TIMEOUT_SECS,
};

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

fn require_non_empty(field: &str, value: &str) -> FxResult<()> {
    if value.trim().is_empty() {
        return Err(FxError::Config(ConfigError::MissingRequired {
            field: field.to_string(),
        }));
    }
    Ok(())
}

fn require_http_url(field: &str, value: &str) -> FxResult<()> {
    require_non_empty(field, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(FxError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be an http(s) URL".to_string(),
        }));
    }
    Ok(())
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Client-credentials grant settings and the credential cache's timing.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Token endpoint receiving the client-credentials POST.
    pub token_url: String,
    pub client_id: String,
    /// Never logged; `Debug` prints it redacted.
    pub client_secret: SecretString,
    pub scope: String,
    /// Refresh when the cached token is this close to expiry.
    pub refresh_buffer: Duration,
    /// Period of the proactive background check.
    pub check_interval: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:9090/oauth/token".to_string(),
            client_id: "fxrate-api".to_string(),
            client_secret: SecretString::new(String::new().into()),
            scope: "rates:read".to_string(),
            refresh_buffer: Duration::from_secs(DEFAULT_TOKEN_REFRESH_BUFFER_SECS),
            check_interval: Duration::from_secs(DEFAULT_TOKEN_CHECK_INTERVAL_SECS),
        }
    }
}

impl CredentialConfig {
    /// Create CredentialConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FXRATE_TOKEN_URL`: Token endpoint
    /// - `FXRATE_CLIENT_ID`: OAuth client id
    /// - `FXRATE_CLIENT_SECRET`: OAuth client secret
    /// - `FXRATE_TOKEN_SCOPE`: Requested scope
    /// - `FXRATE_TOKEN_REFRESH_BUFFER_SECS`: Refresh buffer (default: 300)
    /// - `FXRATE_TOKEN_CHECK_INTERVAL_SECS`: Proactive check period (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: env_string("FXRATE_TOKEN_URL").unwrap_or(defaults.token_url),
            client_id: env_string("FXRATE_CLIENT_ID").unwrap_or(defaults.client_id),
            client_secret: env_string("FXRATE_CLIENT_SECRET")
                .map(|s| SecretString::new(s.into()))
                .unwrap_or(defaults.client_secret),
            scope: env_string("FXRATE_TOKEN_SCOPE").unwrap_or(defaults.scope),
            refresh_buffer: env_secs(
                "FXRATE_TOKEN_REFRESH_BUFFER_SECS",
                DEFAULT_TOKEN_REFRESH_BUFFER_SECS,
            ),
            check_interval: env_secs(
                "FXRATE_TOKEN_CHECK_INTERVAL_SECS",
                DEFAULT_TOKEN_CHECK_INTERVAL_SECS,
            ),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        require_http_url("token_url", &self.token_url)?;
        require_non_empty("client_id", &self.client_id)?;
        if self.check_interval.is_zero() {
            return Err(FxError::Config(ConfigError::InvalidValue {
                field: "check_interval".to_string(),
                value: format!("{:?}", self.check_interval),
                reason: "check_interval must be positive".to_string(),
            }));
        }
        if self.client_secret.expose_secret().is_empty() {
            tracing::warn!("FXRATE_CLIENT_SECRET is empty; token requests will likely be rejected");
        }
        Ok(())
    }
}

// ============================================================================
// AUTHORITATIVE FETCH
// ============================================================================

/// Authoritative rate source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Rates are fetched from `{base_url}/{PAIR}`.
    pub base_url: String,
    /// Per-request timeout for both upstream clients.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090/rates".to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

impl FetchConfig {
    /// Environment variables:
    /// - `FXRATE_SOURCE_URL`: Rate source base URL
    /// - `FXRATE_UPSTREAM_TIMEOUT_SECS`: Request timeout (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("FXRATE_SOURCE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: env_secs("FXRATE_UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        require_http_url("base_url", &self.base_url)
    }
}

// ============================================================================
// SERVER
// ============================================================================

/// HTTP server, CORS and in-process queue settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Visibility timeout of the in-process refresh queue.
    pub queue_visibility_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            queue_visibility_timeout: Duration::from_secs(DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Environment variables:
    /// - `FXRATE_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `FXRATE_PORT`: Listen port (default: 8080)
    /// - `FXRATE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `FXRATE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `FXRATE_QUEUE_VISIBILITY_SECS`: Queue visibility timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("FXRATE_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("FXRATE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("FXRATE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            host: env_string("FXRATE_BIND").unwrap_or(defaults.host),
            port,
            cors_origins,
            cors_max_age_secs,
            queue_visibility_timeout: env_secs(
                "FXRATE_QUEUE_VISIBILITY_SECS",
                DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS,
            ),
        }
    }

    /// Check if running in production mode (specific CORS origins configured).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// Every configuration value the service binary injects into its
/// components.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub lookup: LookupConfig,
    pub credentials: CredentialConfig,
    pub fetch: FetchConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            lookup: LookupConfig::from_env(),
            credentials: CredentialConfig::from_env(),
            fetch: FetchConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            worker: WorkerConfig::from_env(),
            server: ServerConfig::from_env(),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        self.lookup.validate()?;
        self.credentials.validate()?;
        self.fetch.validate()?;
        self.scheduler.validate()?;
        self.worker.validate()
    }
}
