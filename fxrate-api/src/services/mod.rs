//! Service Layer
//!
//! The request-path components and the upstream HTTP clients they use.

mod credentials;
mod fetcher;
mod lookup;

pub use credentials::{parse_token_response, CredentialCache, HttpTokenIssuer};
pub use fetcher::{parse_rate_payload, HttpRateSource};
pub use lookup::{LookupCoordinator, LookupError};
