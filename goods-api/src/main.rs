//! Goods API Server Entry Point
//!
//! Reads configuration from the environment, opens the selected backends,
//! starts the background jobs and serves HTTP until Ctrl-C.

use goods_api::telemetry::{init_tracer, TelemetryConfig};
use goods_api::{ApiError, ApiResult, App, Backends, ServerConfig, ServiceConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::from_env())?;

    let service_config = ServiceConfig::from_env();
    let server_config = ServerConfig::from_env();

    let backends = Backends::from_config(&service_config)?;
    let app = App::start(backends, &service_config)?;
    let router = app.router(server_config.request_timeout);

    let addr = server_config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Starting Goods API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let summary = app.shutdown().await;
    tracing::info!(?summary, "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
