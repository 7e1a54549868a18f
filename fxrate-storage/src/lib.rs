//! fxrate Storage - Cache and Queue Collaborators
//!
//! Defines the collaborator traits the service consumes ([`KeyValueCache`],
//! [`RefreshQueue`]), in-memory implementations of both, and the typed views
//! built on the cache: [`RateCache`], [`UsageTracker`] and [`MarkerStore`].

pub mod cache;
pub mod markers;
pub mod queue;
pub mod rate_cache;
pub mod usage;

pub use cache::{InMemoryCache, KeyValueCache};
pub use markers::{LastRefresh, MarkerStore};
pub use queue::{InMemoryQueue, QueueMessage, ReceiptHandle, RefreshQueue};
pub use rate_cache::RateCache;
pub use usage::UsageTracker;
