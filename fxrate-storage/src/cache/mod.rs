//! Shared cache collaborator.
//!
//! [`KeyValueCache`] is the only source of truth for rate records, usage
//! scores and refresh markers. Production deployments back it with a
//! Redis-compatible store; [`InMemoryCache`] serves the standalone binary and
//! tests.

pub mod memory;
pub mod traits;

pub use memory::InMemoryCache;
pub use traits::KeyValueCache;
