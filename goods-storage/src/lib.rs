//! Goods Storage - Adapter Contracts and Local Backends
//!
//! Defines the four store contracts the orchestration service composes
//! (relational, cache, bus, analytics) and ships the implementations that
//! do not need an external server:
//!
//! - [`cache::LmdbSnapshotCache`] and [`cache::InMemorySnapshotCache`]
//! - [`bus::FanoutBus`]
//! - [`memory::InMemoryGoodsStore`] and [`memory::InMemoryAnalyticsStore`]
//!
//! The Postgres adapters live in `goods-api` next to the connection pool.

pub mod bus;
pub mod cache;
pub mod memory;
pub mod traits;

pub use bus::FanoutBus;
pub use cache::{
    decode_snapshot, encode_snapshot, CacheStats, InMemorySnapshotCache, LmdbCacheError,
    LmdbSnapshotCache,
};
pub use memory::{InMemoryAnalyticsStore, InMemoryGoodsStore, StoredLogEntry};
pub use traits::{AnalyticsStore, BusSubscription, CacheStore, MessageBus, RelationalStore};
