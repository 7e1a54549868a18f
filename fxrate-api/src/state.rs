//! Shared application state for Axum routers.

use std::sync::Arc;

use fxrate_storage::KeyValueCache;

use crate::routes::health::HealthState;
use crate::services::LookupCoordinator;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Serves every conversion request.
    pub coordinator: Arc<LookupCoordinator>,
    /// Cache probe and uptime for the readiness endpoint.
    pub health: Arc<HealthState>,
}

impl AppState {
    pub fn new(coordinator: Arc<LookupCoordinator>, cache: Arc<dyn KeyValueCache>) -> Self {
        Self {
            coordinator,
            health: Arc::new(HealthState::new(cache)),
        }
    }
}

crate::impl_from_ref!(Arc<LookupCoordinator>, coordinator);
crate::impl_from_ref!(Arc<HealthState>, health);
