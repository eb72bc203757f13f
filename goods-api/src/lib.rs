//! Goods API - Orchestration Service and REST Layer
//!
//! Composes the relational store, the snapshot cache, the change bus and the
//! analytics store behind [`GoodsService`], runs the cache refill and audit
//! ingestion jobs, and exposes the catalog over Axum.
//!
//! The Postgres adapters for the relational and analytics stores live in
//! [`db`]; the remaining backends come from `goods-storage`.

pub mod app;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use app::{App, Backends, ShutdownSummary};
pub use config::{CacheBackend, ServerConfig, ServiceConfig, StoreBackend};
pub use db::{DbConfig, PgAnalyticsStore, PgGoodsStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{BatchConsumer, CacheRefiller, FlushPolicy, IngestConfig};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::GoodsService;
pub use state::AppState;
pub use types::*;
