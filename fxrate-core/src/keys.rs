//! Key layout of the shared cache.

use crate::Pair;

pub const RATE_PREFIX: &str = "rate:";
pub const IN_FLIGHT_PREFIX: &str = "inflight:";
pub const LAST_REFRESH_PREFIX: &str = "last_refresh:";

/// Sorted set ranking pairs by lookup count.
pub const POPULAR_PAIRS: &str = "usage:popular_pairs";

/// Value stored under an in-flight marker.
pub const IN_FLIGHT_VALUE: &str = "true";

pub fn rate_key(pair: &Pair) -> String {
    format!("{}{}", RATE_PREFIX, pair)
}

pub fn in_flight_key(pair: &Pair) -> String {
    format!("{}{}", IN_FLIGHT_PREFIX, pair)
}

pub fn last_refresh_key(pair: &Pair) -> String {
    format!("{}{}", LAST_REFRESH_PREFIX, pair)
}
