//! fxrate API - Conversion Service Layer
//!
//! Serves currency conversions from a shared rate cache. Misses fall back to
//! the authoritative rate source; background jobs keep popular pairs warm
//! through a refresh queue:
//!
//! - `services::LookupCoordinator` answers each request (cache, fallback, or
//!   UNAVAILABLE plus a queued refresh)
//! - `services::CredentialCache` shares one bearer token across all callers
//! - `jobs::RefreshScheduler` queues refreshes for popular pairs that are due
//! - `jobs::RefreshWorker` consumes the queue and writes fresh rates

#[macro_use]
mod macros;

pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use app::{AppServices, BackgroundJobs};
pub use config::{AppConfig, CredentialConfig, FetchConfig, ServerConfig};
pub use error::{ApiError, ApiResult, DownstreamFailure, ErrorCode};
pub use jobs::{RefreshScheduler, RefreshWorker};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{
    CredentialCache, HttpRateSource, HttpTokenIssuer, LookupCoordinator, LookupError,
};
pub use state::AppState;
