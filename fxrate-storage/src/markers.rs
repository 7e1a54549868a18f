//! In-flight and last-refresh markers.
//!
//! The in-flight marker is a distributed mutual exclusion built on a single
//! set-if-absent-with-TTL call. The last-refresh marker stores the epoch
//! milliseconds of the most recent fetch attempt.

use crate::KeyValueCache;
use chrono::DateTime;
use fxrate_core::{epoch_millis, keys, CacheError, Pair, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// Decoded state of a last-refresh marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastRefresh {
    /// No marker present.
    Never,
    /// Marker holds a valid epoch-millisecond timestamp.
    At(Timestamp),
    /// Marker present but unparseable.
    Malformed(String),
}

impl LastRefresh {
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(LastRefresh::At)
            .unwrap_or_else(|| LastRefresh::Malformed(raw.to_string()))
    }
}

#[derive(Clone)]
pub struct MarkerStore {
    cache: Arc<dyn KeyValueCache>,
}

impl MarkerStore {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub async fn is_in_flight(&self, pair: &Pair) -> Result<bool, CacheError> {
        Ok(self.cache.get(&keys::in_flight_key(pair)).await?.is_some())
    }

    /// Claim the pair for refresh. Returns `false` when another tick already
    /// holds the marker.
    pub async fn try_mark_in_flight(&self, pair: &Pair, ttl: Duration) -> Result<bool, CacheError> {
        self.cache
            .set_if_absent_with_ttl(
                &keys::in_flight_key(pair),
                keys::IN_FLIGHT_VALUE.to_string(),
                ttl,
            )
            .await
    }

    /// Remaining lifetime of the pair's in-flight marker.
    pub async fn in_flight_ttl(&self, pair: &Pair) -> Result<Option<Duration>, CacheError> {
        self.cache.ttl(&keys::in_flight_key(pair)).await
    }

    pub async fn last_refresh(&self, pair: &Pair) -> Result<LastRefresh, CacheError> {
        Ok(match self.cache.get(&keys::last_refresh_key(pair)).await? {
            None => LastRefresh::Never,
            Some(raw) => LastRefresh::parse(&raw),
        })
    }

    pub async fn record_refresh(&self, pair: &Pair, at: Timestamp) -> Result<(), CacheError> {
        self.cache
            .set(&keys::last_refresh_key(pair), epoch_millis(at).to_string())
            .await
    }
}
