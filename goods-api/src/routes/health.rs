//! Health Check Endpoint
//!
//! Liveness only: answers as long as the process is serving requests.

use axum::{routing::get, Json, Router};

use crate::state::AppState;
use crate::types::HealthResponse;

/// GET /health - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
