//! Goods Telemetry - Logging and Metrics Infrastructure
//!
//! Installs the process-wide `tracing` subscriber and exposes the service
//! counters to Prometheus. Request spans come from
//! `tower_http::trace::TraceLayer` in the router.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics_handler, ServiceMetrics};
pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
