//! Normalized currency pair identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency pair in normalized `BASE_QUOTE` uppercase form.
///
/// Every key in the shared cache and every queue payload is derived from
/// this form, so two requests for `usd/eur` and `USD/EUR` hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct Pair(String);

impl Pair {
    /// Separator between base and quote codes.
    pub const SEPARATOR: char = '_';

    /// Build a pair from its base and quote currency codes.
    pub fn new(base: &str, quote: &str) -> Self {
        Self(format!(
            "{}{}{}",
            base.trim().to_uppercase(),
            Self::SEPARATOR,
            quote.trim().to_uppercase()
        ))
    }

    /// Accept an already-joined identifier (queue payloads, sorted-set
    /// members). Returns `None` for blank input.
    pub fn from_normalized(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Pair {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pair_normalizes_case_and_whitespace() {
        let pair = Pair::new(" usd", "eur ");
        assert_eq!(pair.as_str(), "USD_EUR");
        assert_eq!(pair, Pair::new("USD", "EUR"));
    }

    #[test]
    fn test_from_normalized_uppercases() {
        assert_eq!(Pair::from_normalized("btc_usd").unwrap().as_str(), "BTC_USD");
        assert_eq!(Pair::from_normalized("BTCUSD").unwrap().as_str(), "BTCUSD");
    }

    #[test]
    fn test_from_normalized_rejects_blank() {
        assert!(Pair::from_normalized("").is_none());
        assert!(Pair::from_normalized("   ").is_none());
    }

    #[test]
    fn test_pair_serializes_as_plain_string() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&Pair::new("gbp", "jpy"))?;
        assert_eq!(json, "\"GBP_JPY\"");
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Normalization is case-insensitive in both codes.
        #[test]
        fn prop_pair_case_insensitive(base in "[a-zA-Z]{3}", quote in "[a-zA-Z]{3}") {
            let lower = Pair::new(&base.to_lowercase(), &quote.to_lowercase());
            let upper = Pair::new(&base.to_uppercase(), &quote.to_uppercase());
            prop_assert_eq!(lower.clone(), upper);
            prop_assert_eq!(lower.as_str().to_uppercase(), lower.as_str());
        }

        /// Re-normalizing a normalized pair is the identity.
        #[test]
        fn prop_from_normalized_idempotent(base in "[a-z]{3}", quote in "[a-z]{3}") {
            let pair = Pair::new(&base, &quote);
            let again = Pair::from_normalized(pair.as_str());
            prop_assert_eq!(again, Some(pair));
        }
    }
}
