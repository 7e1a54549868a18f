//! Usage tracker: per-pair lookup counts backing the popularity ranking.

use crate::KeyValueCache;
use fxrate_core::{keys, CacheError, Pair};
use std::sync::Arc;

/// Sorted-set view over `usage:popular_pairs`.
///
/// Scores only ever grow; there is no decay or eviction.
#[derive(Clone)]
pub struct UsageTracker {
    cache: Arc<dyn KeyValueCache>,
}

impl UsageTracker {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Bump the pair's score by one and return the new score.
    pub async fn increment(&self, pair: &Pair) -> Result<f64, CacheError> {
        self.cache
            .zincrement(keys::POPULAR_PAIRS, pair.as_str(), 1.0)
            .await
    }

    /// The `n` highest-scored pairs, most popular first.
    pub async fn top_n(&self, n: usize) -> Result<Vec<Pair>, CacheError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let members = self.cache.zrev_range(keys::POPULAR_PAIRS, 0, n - 1).await?;
        Ok(members
            .iter()
            .filter_map(|m| Pair::from_normalized(m))
            .collect())
    }

    /// Current score, zero when the pair was never counted.
    pub async fn score(&self, pair: &Pair) -> Result<f64, CacheError> {
        Ok(self
            .cache
            .zscore(keys::POPULAR_PAIRS, pair.as_str())
            .await?
            .unwrap_or(0.0))
    }
}
