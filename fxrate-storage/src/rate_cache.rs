//! Typed access to rate records in the shared cache.

use crate::KeyValueCache;
use fxrate_core::{keys, CacheError, Pair, RateRecord};
use std::sync::Arc;

/// Rate records keyed by `rate:<PAIR>`, stored as JSON.
#[derive(Clone)]
pub struct RateCache {
    cache: Arc<dyn KeyValueCache>,
}

impl RateCache {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Look up the cached record for a pair.
    ///
    /// An entry that fails to decode is reported as
    /// [`CacheError::Serialization`].
    pub async fn get(&self, pair: &Pair) -> Result<Option<RateRecord>, CacheError> {
        let key = keys::rate_key(pair);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Serialization {
                key,
                reason: e.to_string(),
            })
    }

    /// Overwrite the record for its pair.
    pub async fn put(&self, record: &RateRecord) -> Result<(), CacheError> {
        let key = keys::rate_key(&record.pair);
        let raw = serde_json::to_string(record).map_err(|e| CacheError::Serialization {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.cache.set(&key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryCache;
    use chrono::{DateTime, Utc};

    fn record(rate: f64) -> RateRecord {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        RateRecord::new(Pair::new("USD", "EUR"), rate, "ecb", ts).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let rates = RateCache::new(Arc::new(InMemoryCache::new()));
        let pair = Pair::new("usd", "eur");
        assert!(rates.get(&pair).await.unwrap().is_none());

        rates.put(&record(0.92)).await.unwrap();
        assert_eq!(rates.get(&pair).await.unwrap(), Some(record(0.92)));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let rates = RateCache::new(Arc::new(InMemoryCache::new()));
        rates.put(&record(0.92)).await.unwrap();
        rates.put(&record(0.93)).await.unwrap();
        let got = rates.get(&Pair::new("USD", "EUR")).await.unwrap().unwrap();
        assert_eq!(got.rate, 0.93);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_serialization_error() {
        let backend = Arc::new(InMemoryCache::new());
        backend
            .set("rate:USD_EUR", "not json".to_string())
            .await
            .unwrap();
        let rates = RateCache::new(backend);

        let err = rates.get(&Pair::new("USD", "EUR")).await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization { .. }));
    }
}
