//! Background Jobs for the Goods API
//!
//! Long-lived tasks spawned at startup, each with its own shutdown signal:
//!
//! - `cache_refill`: rebuilds the snapshot cache after read misses
//! - `audit_ingest`: drains change events from the bus into the audit log
//!
//! # Usage
//!
//! ```ignore
//! use goods_api::jobs::{spawn_audit_ingest, CacheRefiller, IngestConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! let (refiller, refill_handle) =
//!     CacheRefiller::spawn(relational.clone(), cache.clone(), 16, shutdown_rx.clone());
//! let ingest = spawn_audit_ingest(bus.as_ref(), analytics, IngestConfig::default(), shutdown_rx)?;
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod audit_ingest;
pub mod cache_refill;

// Re-export commonly used types
pub use audit_ingest::{
    spawn_audit_ingest, BatchConsumer, FlushPolicy, IngestConfig, IngestHandle, IngestMetrics,
    IngestSnapshot,
};
pub use cache_refill::{refill_once, CacheRefiller, RefillMetrics, RefillSnapshot};
