//! Constants for the Goods API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind address
pub const DEFAULT_API_BIND: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// CACHE
// ============================================================================

/// Default directory of the LMDB snapshot cache
pub const DEFAULT_CACHE_PATH: &str = "./data/goods-cache";

/// Default LMDB map size in megabytes
pub const DEFAULT_CACHE_MAX_MB: usize = 64;

/// Default capacity of the cache refill queue
pub const DEFAULT_REFILL_QUEUE: usize = 16;

// ============================================================================
// MESSAGE BUS
// ============================================================================

/// Default per-subscriber buffer of the in-process bus
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Buffer between the bus subscription and the ingestion task
pub const INGEST_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// DATABASE
// ============================================================================

/// Attempts for a reprioritization that keeps hitting serialization failures
pub const REPRIORITIZE_MAX_ATTEMPTS: u32 = 3;

/// Default connection pool size
pub const DEFAULT_DB_POOL_SIZE: usize = 16;

/// Default pool wait/create timeout in seconds
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 30;
