//! REST API Routes Module
//!
//! Assembles the goods, health and metrics routes and applies the
//! middleware stack: request tracing, then a per-request timeout that
//! answers `504`.

use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, routing::get, BoxError, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::metrics_handler;

pub mod goods;
pub mod health;

#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Map middleware failures to API errors.
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::timeout("request")
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        ApiError::internal_error("Unhandled middleware error")
    }
}

/// Create the complete API router.
pub fn create_api_router(state: AppState, request_timeout: Duration) -> Router {
    #[cfg_attr(not(feature = "openapi"), allow(unused_mut))]
    let mut router = Router::new()
        .nest("/goods", goods::create_router())
        .merge(health::create_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    {
        router = router.route("/openapi.json", get(openapi_json));
    }

    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(request_timeout),
    )
}
