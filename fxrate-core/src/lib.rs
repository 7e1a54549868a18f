//! fxrate Core - Rate Cache Entity Types
//!
//! Pure data structures shared by every fxrate crate: currency pairs, rate
//! records, credential snapshots, refresh jobs, the key layout of the shared
//! cache, and the error taxonomy. The upstream collaborator traits are
//! declared here; this crate performs no I/O itself.

use chrono::{DateTime, Utc};

mod config;
mod error;
pub mod keys;
mod pair;
mod rate;
mod token;
mod upstream;

pub use config::{LookupConfig, SchedulerConfig, WorkerConfig};
pub use error::*;
pub use pair::Pair;
pub use rate::{Conversion, ConversionState, RateRecord, RefreshJob};
pub use token::CachedToken;
pub use upstream::{FetchOutcome, RateSource, TokenIssuer};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier attached to every downstream failure for log correlation.
pub type CorrelationId = uuid::Uuid;

/// Generate a new UUIDv7 correlation id (timestamp-sortable).
pub fn new_correlation_id() -> CorrelationId {
    uuid::Uuid::now_v7()
}

/// Milliseconds since the Unix epoch for the given timestamp.
///
/// Last-refresh markers are stored in this representation.
pub fn epoch_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}
