//! Key-value cache collaborator trait.
//!
//! Mirrors the subset of a Redis-style store the service consumes: plain
//! string values with optional TTL, an atomic set-if-absent, and sorted sets
//! for the popularity ranking. Every operation is a single atomic call; the
//! service never relies on cross-key transactions.

use async_trait::async_trait;
use fxrate_core::CacheError;
use std::time::Duration;

/// Shared cache backend.
///
/// Implementations must be safe to share across the request path, the
/// scheduler and the worker.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Read a string value. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value with no expiry, replacing any existing value and TTL.
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    /// Write a value that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), CacheError>;

    /// Atomically write a value with TTL only if the key is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Remaining lifetime of a key. `None` when the key is absent or has no
    /// expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// Atomically add `delta` to a sorted-set member's score, creating it at
    /// zero first if needed. Returns the new score.
    async fn zincrement(&self, key: &str, member: &str, delta: f64) -> Result<f64, CacheError>;

    /// Score of a sorted-set member.
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError>;

    /// Members ranked by descending score, positions `start..=stop`.
    ///
    /// Equal scores order by member descending, matching Redis
    /// `ZREVRANGE`.
    async fn zrev_range(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<String>, CacheError>;

    /// Cheap liveness probe used by readiness checks.
    async fn ping(&self) -> Result<(), CacheError>;
}
