//! Configuration types
//!
//! Every component receives its configuration at construction time. The
//! `from_env` constructors read `FXRATE_*` variables and fall back to the
//! defaults on absent or unparseable values.

use crate::{ConfigError, FxError, FxResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_secs(name: &str, default: Duration) -> Duration {
    env_parse::<u64>(name)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    env_parse::<u64>(name)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn non_zero(field: &str, value: Duration) -> FxResult<()> {
    if value.is_zero() {
        return Err(FxError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: format!("{:?}", value),
            reason: format!("{} must be positive", field),
        }));
    }
    Ok(())
}

// ============================================================================
// LOOKUP
// ============================================================================

/// Lookup coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Value of the `Retry-After` header on downstream failures.
    pub retry_after: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            retry_after: Duration::from_secs(30),
        }
    }
}

impl LookupConfig {
    /// Environment variables:
    /// - `FXRATE_RETRY_AFTER_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retry_after: env_secs("FXRATE_RETRY_AFTER_SECS", defaults.retry_after),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        non_zero("retry_after", self.retry_after)
    }
}

// ============================================================================
// REFRESH SCHEDULER
// ============================================================================

/// Refresh scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How many of the most popular pairs each tick considers.
    pub top_pairs_count: usize,
    /// Minimum time between two refreshes of the same pair.
    pub refresh_interval: Duration,
    /// Lifetime of the in-flight marker set before enqueuing.
    pub in_flight_ttl: Duration,
    /// Tick period.
    pub period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            top_pairs_count: 10,
            refresh_interval: Duration::from_millis(60_000),
            in_flight_ttl: Duration::from_secs(120),
            period: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    /// Environment variables:
    /// - `FXRATE_TOP_PAIRS_COUNT` (default: 10)
    /// - `FXRATE_REFRESH_INTERVAL_MS` (default: 60000)
    /// - `FXRATE_IN_FLIGHT_TTL_SECS` (default: 120)
    /// - `FXRATE_SCHEDULER_PERIOD_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            top_pairs_count: env_parse("FXRATE_TOP_PAIRS_COUNT")
                .unwrap_or(defaults.top_pairs_count),
            refresh_interval: env_millis("FXRATE_REFRESH_INTERVAL_MS", defaults.refresh_interval),
            in_flight_ttl: env_secs("FXRATE_IN_FLIGHT_TTL_SECS", defaults.in_flight_ttl),
            period: env_secs("FXRATE_SCHEDULER_PERIOD_SECS", defaults.period),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        if self.top_pairs_count == 0 {
            return Err(FxError::Config(ConfigError::InvalidValue {
                field: "top_pairs_count".to_string(),
                value: self.top_pairs_count.to_string(),
                reason: "top_pairs_count must be at least 1".to_string(),
            }));
        }
        non_zero("in_flight_ttl", self.in_flight_ttl)?;
        non_zero("period", self.period)
    }
}

// ============================================================================
// REFRESH WORKER
// ============================================================================

/// Refresh worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound on messages per receive.
    pub max_messages: usize,
    /// Long-poll wait per receive.
    pub wait_time: Duration,
    /// Sleep after a failed receive.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time: Duration::from_secs(20),
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Environment variables:
    /// - `FXRATE_WORKER_MAX_MESSAGES` (default: 10)
    /// - `FXRATE_WORKER_WAIT_SECS` (default: 20)
    /// - `FXRATE_WORKER_BACKOFF_MS` (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_messages: env_parse("FXRATE_WORKER_MAX_MESSAGES")
                .unwrap_or(defaults.max_messages),
            wait_time: env_secs("FXRATE_WORKER_WAIT_SECS", defaults.wait_time),
            error_backoff: env_millis("FXRATE_WORKER_BACKOFF_MS", defaults.error_backoff),
        }
    }

    pub fn validate(&self) -> FxResult<()> {
        if self.max_messages == 0 {
            return Err(FxError::Config(ConfigError::InvalidValue {
                field: "max_messages".to_string(),
                value: self.max_messages.to_string(),
                reason: "max_messages must be at least 1".to_string(),
            }));
        }
        non_zero("error_backoff", self.error_backoff)
    }
}

// =============================================================================
// TESTS
// =============================================================================
