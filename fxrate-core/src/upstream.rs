//! Upstream collaborator traits.
//!
//! The authoritative rate service and the token endpoint sit outside this
//! workspace. HTTP implementations live in `fxrate-api`; tests substitute
//! scripted implementations.

use crate::{CachedToken, CredentialError, FetchError, Pair, RateRecord};
use async_trait::async_trait;

/// Outcome of fetching one pair: `None` is a clean not-found.
pub type FetchOutcome = (Pair, Option<RateRecord>);

/// Authoritative source of exchange rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rate for a pair using a bearer token.
    ///
    /// Returns `Ok(None)` when the source has no data for the pair.
    async fn fetch(&self, pair: &Pair, token: &str) -> Result<Option<RateRecord>, FetchError>;

    /// Fetch several pairs. Fails as a whole on the first error.
    async fn fetch_batch(
        &self,
        pairs: &[Pair],
        token: &str,
    ) -> Result<Vec<FetchOutcome>, FetchError> {
        let mut outcomes = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let record = self.fetch(pair, token).await?;
            outcomes.push((pair.clone(), record));
        }
        Ok(outcomes)
    }
}

/// Issuer of client-credentials bearer tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Perform one network round trip for a fresh token.
    async fn issue(&self) -> Result<CachedToken, CredentialError>;
}
