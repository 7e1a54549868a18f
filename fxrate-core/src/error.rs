//! Error types for fxrate operations

use thiserror::Error;

/// Shared cache collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },
}

/// Refresh queue collaborator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Publish failed for {pair}: {reason}")]
    PublishFailed { pair: String, reason: String },

    #[error("Acknowledge failed for {count} message(s): {reason}")]
    AckFailed { count: usize, reason: String },
}

/// Authoritative rate fetch errors.
///
/// A clean not-found is not represented here; the fetch returns `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error fetching {pair}: {reason}")]
    Transport { pair: String, reason: String },

    #[error("Unexpected status {status} fetching {pair}")]
    UnexpectedStatus { pair: String, status: u16 },

    #[error("Malformed response for {pair}: {reason}")]
    MalformedBody { pair: String, reason: String },

    #[error("Credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}

/// Token endpoint errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Transport error contacting token endpoint: {reason}")]
    Transport { reason: String },

    #[error("Token endpoint returned status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("Malformed token response: {reason}")]
    MalformedBody { reason: String },
}

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all fxrate errors.
#[derive(Debug, Clone, Error)]
pub enum FxError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for fxrate operations.
pub type FxResult<T> = Result<T, FxError>;

// =============================================================================
// TESTS
// =============================================================================
