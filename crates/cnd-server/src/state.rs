//! Application state for the HTTP server.

use std::sync::Arc;

use crate::service::PackageService;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Submission pipeline and package operations.
    pub service: Arc<PackageService>,
}

impl AppState {
    pub fn new(service: PackageService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
