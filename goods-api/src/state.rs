//! Shared application state for Axum routers.

use std::sync::Arc;

use crate::services::GoodsService;
use crate::telemetry::ServiceMetrics;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub service: GoodsService,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(service: GoodsService, metrics: Arc<ServiceMetrics>) -> Self {
        Self { service, metrics }
    }
}

crate::impl_from_ref!(GoodsService, service);
crate::impl_from_ref!(Arc<ServiceMetrics>, metrics);
