//! Bearer credential snapshot.

use crate::Timestamp;
use std::fmt;
use std::time::Duration;

/// An issued bearer token and the instant it stops being valid.
///
/// Snapshots are immutable; a refresh publishes a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    token: String,
    expires_at: Timestamp,
}

impl CachedToken {
    pub fn new(token: impl Into<String>, expires_at: Timestamp) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Build a snapshot from an `expires_in` seconds value as returned by
    /// the token endpoint. `None` when the expiry is not representable.
    pub fn try_issued_at(
        token: impl Into<String>,
        now: Timestamp,
        expires_in_secs: i64,
    ) -> Option<Self> {
        let lifetime = chrono::Duration::try_seconds(expires_in_secs)?;
        let expires_at = now.checked_add_signed(lifetime)?;
        Some(Self::new(token, expires_at))
    }

    /// Like [`try_issued_at`](Self::try_issued_at), saturating at the
    /// representable bounds.
    pub fn issued_at(token: impl Into<String>, now: Timestamp, expires_in_secs: i64) -> Self {
        let token = token.into();
        match Self::try_issued_at(token.clone(), now, expires_in_secs) {
            Some(snapshot) => snapshot,
            None if expires_in_secs < 0 => Self::new(token, Timestamp::MIN_UTC),
            None => Self::new(token, Timestamp::MAX_UTC),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// Past expiry at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Expired, or within `buffer` of expiring.
    pub fn needs_refresh(&self, now: Timestamp, buffer: Duration) -> bool {
        let buffer = chrono::Duration::from_std(buffer).unwrap_or(chrono::Duration::MAX);
        match self.expires_at.checked_sub_signed(buffer) {
            Some(refresh_at) => now >= refresh_at,
            None => true,
        }
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn t0() -> Timestamp {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_issued_at_adds_expires_in() {
        let token = CachedToken::issued_at("abc", t0(), 3600);
        assert_eq!(token.expires_at(), t0() + chrono::Duration::seconds(3600));
        assert_eq!(token.token(), "abc");
    }

    #[test]
    fn test_unrepresentable_lifetime() {
        assert_eq!(CachedToken::try_issued_at("abc", t0(), i64::MAX), None);
        assert_eq!(CachedToken::try_issued_at("abc", t0(), i64::MIN), None);

        let far = CachedToken::issued_at("abc", t0(), i64::MAX);
        assert_eq!(far.expires_at(), Timestamp::MAX_UTC);
        assert!(!far.needs_refresh(t0(), Duration::from_secs(300)));

        let past = CachedToken::issued_at("abc", t0(), i64::MIN);
        assert!(past.is_expired(t0()));
    }

    #[test]
    fn test_needs_refresh_respects_buffer() {
        let token = CachedToken::issued_at("abc", t0(), 3600);
        let buffer = Duration::from_secs(300);

        assert!(!token.needs_refresh(t0(), buffer));
        assert!(!token.needs_refresh(t0() + chrono::Duration::seconds(3299), buffer));
        assert!(token.needs_refresh(t0() + chrono::Duration::seconds(3300), buffer));
        assert!(token.needs_refresh(t0() + chrono::Duration::seconds(4000), buffer));
    }

    #[test]
    fn test_is_expired_boundary() {
        let token = CachedToken::issued_at("abc", t0(), 60);
        assert!(!token.is_expired(t0() + chrono::Duration::seconds(59)));
        assert!(token.is_expired(t0() + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_short_lived_token_always_needs_refresh() {
        // expires_in shorter than the buffer
        let token = CachedToken::issued_at("abc", t0(), 120);
        assert!(token.needs_refresh(t0(), Duration::from_secs(300)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = CachedToken::issued_at("super-secret", t0(), 60);
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
