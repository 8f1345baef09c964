//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::LeaseService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lease service for all pool operations.
    pub lease_service: Arc<LeaseService>,
}
