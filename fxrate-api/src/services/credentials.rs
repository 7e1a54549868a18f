//! Credential Cache
//!
//! Holds the current bearer token as an immutable snapshot and refreshes it
//! through a single-flight section shared by request-driven and background
//! triggers:
//!
//! - `get_token` returns the snapshot while it is outside the refresh buffer
//! - otherwise the caller enters the refresh section, re-checks staleness
//!   (another caller may have just refreshed) and performs the network call
//! - losers of the race wait on the section and then re-read the snapshot
//!
//! A failed refresh never replaces the published snapshot. Its error is
//! reported to the triggering caller and to every caller that queued on the
//! section during that attempt; only later arrivals start a new attempt.

use async_trait::async_trait;
use chrono::Utc;
use fxrate_core::{CachedToken, CredentialError, Timestamp, TokenIssuer};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{CredentialConfig, FetchConfig};
use crate::constants::CLIENT_CREDENTIALS_GRANT;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

// ============================================================================
// CREDENTIAL CACHE
// ============================================================================

pub struct CredentialCache {
    issuer: Arc<dyn TokenIssuer>,
    snapshot: RwLock<Option<Arc<CachedToken>>>,
    /// Refresh section; holds the error of the last attempt if it failed.
    refresh_lock: Mutex<Option<CredentialError>>,
    /// Completed refresh attempts, successful or not.
    attempts: AtomicU64,
    refresh_buffer: Duration,
    refreshes: AtomicU64,
}

impl CredentialCache {
    pub fn new(issuer: Arc<dyn TokenIssuer>, refresh_buffer: Duration) -> Self {
        Self {
            issuer,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
            refresh_buffer,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Seed the cache with an already-issued token.
    pub fn with_snapshot(self, token: CachedToken) -> Self {
        self.publish(Arc::new(token));
        self
    }

    /// Return a token that is not within the refresh buffer of expiry,
    /// refreshing at most once across all concurrent callers.
    pub async fn get_token(&self) -> Result<Arc<CachedToken>, CredentialError> {
        if let Some(token) = self.fresh_snapshot(Utc::now()) {
            return Ok(token);
        }
        self.refresh_if_stale().await
    }

    /// Background trigger: refresh when the snapshot is empty or inside the
    /// buffer. Returns whether this call performed the network refresh.
    pub async fn proactive_refresh(&self) -> Result<bool, CredentialError> {
        if self.fresh_snapshot(Utc::now()).is_some() {
            return Ok(false);
        }
        let before = self.refresh_count();
        self.refresh_if_stale().await?;
        Ok(self.refresh_count() > before)
    }

    /// Currently published snapshot, fresh or not.
    pub fn current(&self) -> Option<Arc<CachedToken>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Successful network refreshes since construction.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn refresh_buffer(&self) -> Duration {
        self.refresh_buffer
    }

    fn fresh_snapshot(&self, now: Timestamp) -> Option<Arc<CachedToken>> {
        self.current()
            .filter(|token| !token.needs_refresh(now, self.refresh_buffer))
    }

    fn publish(&self, token: Arc<CachedToken>) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    async fn refresh_if_stale(&self) -> Result<Arc<CachedToken>, CredentialError> {
        let observed = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh_lock.lock().await;

        if let Some(token) = self.fresh_snapshot(Utc::now()) {
            return Ok(token);
        }
        // An attempt finished while this caller waited; share its failure.
        if self.attempts.load(Ordering::Acquire) != observed {
            if let Some(e) = last_failure.as_ref() {
                return Err(e.clone());
            }
        }

        let started = Instant::now();
        let result = self.issuer.issue().await;
        *last_failure = result.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);

        match result {
            Ok(token) => {
                let token = Arc::new(token);
                self.publish(Arc::clone(&token));
                self.refreshes.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = metrics() {
                    m.record_token_refresh(true);
                    m.set_token_expiry(token.expires_at());
                }
                tracing::info!(
                    expires_at = %token.expires_at(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Bearer token refreshed"
                );
                Ok(token)
            }
            Err(e) => {
                if let Some(m) = metrics() {
                    m.record_token_refresh(false);
                }
                tracing::warn!(
                    error = %e,
                    has_snapshot = self.current().is_some(),
                    "Bearer token refresh failed"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("snapshot", &self.current())
            .field("refresh_buffer", &self.refresh_buffer)
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

// ============================================================================
// HTTP TOKEN ISSUER
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Decode a client-credentials token response issued at `now`.
pub fn parse_token_response(body: &str, now: Timestamp) -> Result<CachedToken, CredentialError> {
    let malformed = |reason: &str| CredentialError::MalformedBody {
        reason: reason.to_string(),
    };
    let payload: TokenPayload =
        serde_json::from_str(body).map_err(|e| malformed(&format!("invalid JSON: {}", e)))?;
    let token = payload
        .access_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| malformed("missing access_token"))?;
    let expires_in = payload
        .expires_in
        .ok_or_else(|| malformed("missing expires_in"))?;
    if expires_in <= 0 {
        return Err(malformed("expires_in must be positive"));
    }
    CachedToken::try_issued_at(token, now, expires_in)
        .ok_or_else(|| malformed("expires_in out of range"))
}

/// POSTs a client-credentials grant to the token endpoint.
pub struct HttpTokenIssuer {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
}

impl HttpTokenIssuer {
    pub fn new(config: &CredentialConfig, fetch: &FetchConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(fetch.timeout)
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &CredentialConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
        }
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self) -> Result<CachedToken, CredentialError> {
        let form = [
            ("grant_type", CLIENT_CREDENTIALS_GRANT),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::Transport {
                reason: format!("failed to read body: {}", e),
            })?;
        parse_token_response(&body, Utc::now())
    }
}

impl std::fmt::Debug for HttpTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenIssuer")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}
