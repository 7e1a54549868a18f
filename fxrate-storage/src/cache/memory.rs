//! In-process implementation of [`KeyValueCache`].
//!
//! Used by the standalone binary and by tests. TTLs are tracked against
//! `tokio::time::Instant`, so tests running with a paused clock can advance
//! past an expiry deterministically.

use super::traits::KeyValueCache;
use async_trait::async_trait;
use fxrate_core::CacheError;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// HashMap-backed cache with per-key TTL and sorted sets.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    values: RwLock<HashMap<String, Entry>>,
    sorted_sets: RwLock<HashMap<String, HashMap<String, f64>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live string keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.values
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired string keys.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut values = self.values.write().await;
        let before = values.len();
        values.retain(|_, e| e.is_live(now));
        before - values.len()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.values.write().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.values.write().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        if values.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        values.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = Instant::now();
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn zincrement(&self, key: &str, member: &str, delta: f64) -> Result<f64, CacheError> {
        let mut sets = self.sorted_sets.write().await;
        let score = sets
            .entry(key.to_string())
            .or_default()
            .entry(member.to_string())
            .or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, CacheError> {
        let sets = self.sorted_sets.read().await;
        Ok(sets.get(key).and_then(|set| set.get(member)).copied())
    }

    async fn zrev_range(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<String>, CacheError> {
        if stop < start {
            return Ok(Vec::new());
        }
        let sets = self.sorted_sets.read().await;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.0.cmp(a.0))
        });

        Ok(ranked
            .into_iter()
            .skip(start)
            .take(stop.saturating_sub(start).saturating_add(1))
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.set("a", "1".to_string()).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(cache.ttl("a").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = InMemoryCache::new();
        cache
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(120)));

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert_eq!(cache.ttl("k").await.unwrap(), None);
        assert_eq!(cache.purge_expired().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_only_once_until_expiry() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(10);

        assert!(cache.set_if_absent_with_ttl("m", "true".into(), ttl).await.unwrap());
        assert!(!cache.set_if_absent_with_ttl("m", "true".into(), ttl).await.unwrap());

        tokio::time::advance(ttl).await;
        assert!(cache.set_if_absent_with_ttl("m", "true".into(), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_clears_previous_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set_with_ttl("k", "a".into(), Duration::from_secs(5))
            .await
            .unwrap();
        cache.set("k", "b".into()).await.unwrap();
        assert_eq!(cache.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sorted_set_ranking() {
        let cache = InMemoryCache::new();
        for _ in 0..10 {
            cache.zincrement("z", "BTCUSD", 1.0).await.unwrap();
        }
        for _ in 0..7 {
            cache.zincrement("z", "ETHUSD", 1.0).await.unwrap();
        }
        cache.zincrement("z", "USD_EUR", 12.0).await.unwrap();

        let top = cache.zrev_range("z", 0, 1).await.unwrap();
        assert_eq!(top, vec!["USD_EUR".to_string(), "BTCUSD".to_string()]);

        let all = cache.zrev_range("z", 0, 9).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(cache.zscore("z", "ETHUSD").await.unwrap(), Some(7.0));
        assert_eq!(cache.zscore("z", "NOPE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zrev_range_missing_key_is_empty() {
        let cache = InMemoryCache::new();
        assert!(cache.zrev_range("missing", 0, 4).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_if_absent_has_single_winner() {
        let cache = std::sync::Arc::new(InMemoryCache::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .set_if_absent_with_ttl("lock", "true".into(), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// zrev_range returns members in non-increasing score order.
        #[test]
        fn prop_zrev_range_sorted(scores in proptest::collection::hash_map("[A-Z]{6}", 1u32..100, 0..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let cache = InMemoryCache::new();
                for (member, score) in &scores {
                    cache.zincrement("z", member, *score as f64).await.unwrap();
                }
                let ranked = cache.zrev_range("z", 0, scores.len()).await.unwrap();
                prop_assert_eq!(ranked.len(), scores.len());
                for window in ranked.windows(2) {
                    prop_assert!(scores[&window[0]] >= scores[&window[1]]);
                }
                Ok(())
            })?;
        }
    }
}
