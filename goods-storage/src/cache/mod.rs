//! Snapshot cache for the goods collection.
//!
//! The cache holds one serialized, id-ordered copy of the whole collection
//! under [`goods_core::SNAPSHOT_CACHE_KEY`]. Reads slice that copy; writes
//! elsewhere in the system invalidate it. It is never the source of truth.
//!
//! Two backends are provided:
//!
//! - [`LmdbSnapshotCache`]: memory-mapped LMDB store, survives restarts,
//!   expiry enforced on read
//! - [`InMemorySnapshotCache`]: process-local, for tests and single-node runs

pub mod lmdb_backend;
pub mod memory;
pub mod snapshot;

pub use lmdb_backend::{LmdbCacheError, LmdbSnapshotCache};
pub use memory::InMemorySnapshotCache;
pub use snapshot::{decode_snapshot, encode_snapshot};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired snapshots included.
    pub misses: u64,
    /// Number of snapshots written.
    pub writes: u64,
    /// Number of explicit invalidations.
    pub invalidations: u64,
    /// Size of the live snapshot in bytes (0 when absent).
    pub snapshot_bytes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
