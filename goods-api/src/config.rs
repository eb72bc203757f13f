//! Service Configuration Module
//!
//! Configuration for the orchestration service, its background workers and
//! the HTTP server. Everything is loaded from environment variables with
//! development defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use goods_core::{DEFAULT_CACHE_TTL_SECS, DEFAULT_LOG_BATCH_SIZE};

use crate::constants::{
    DEFAULT_API_BIND, DEFAULT_API_PORT, DEFAULT_BUS_CAPACITY, DEFAULT_CACHE_MAX_MB,
    DEFAULT_CACHE_PATH, DEFAULT_REFILL_QUEUE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::jobs::FlushPolicy;

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Which snapshot cache implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    #[default]
    Lmdb,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lmdb" => Ok(CacheBackend::Lmdb),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Which relational/analytics implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Settings for the orchestration core and its workers.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Lifetime of a cached snapshot.
    pub cache_ttl: Duration,

    /// Audit rows per analytics flush.
    pub log_batch_size: usize,

    /// When the ingestion buffer is flushed relative to the arriving message.
    pub flush_policy: FlushPolicy,

    /// Pending refills before new requests are dropped.
    pub refill_queue: usize,

    /// Per-subscriber buffer of the in-process bus.
    pub bus_capacity: usize,

    pub cache_backend: CacheBackend,
    pub cache_path: PathBuf,
    pub cache_max_mb: usize,

    pub store_backend: StoreBackend,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            log_batch_size: DEFAULT_LOG_BATCH_SIZE,
            flush_policy: FlushPolicy::default(),
            refill_queue: DEFAULT_REFILL_QUEUE,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            cache_backend: CacheBackend::default(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cache_max_mb: DEFAULT_CACHE_MAX_MB,
            store_backend: StoreBackend::default(),
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GOODS_CACHE_TTL_SECS`: Snapshot lifetime (default: 60)
    /// - `GOODS_LOG_BATCH_SIZE`: Audit rows per flush; 0 or unparsable falls back (default: 25)
    /// - `GOODS_LOG_FLUSH_POLICY`: `before_append` or `on_capacity` (default: before_append)
    /// - `GOODS_REFILL_QUEUE`: Pending refill capacity (default: 16)
    /// - `GOODS_BUS_CAPACITY`: Bus buffer per subscriber (default: 1024)
    /// - `GOODS_CACHE_BACKEND`: `lmdb` or `memory` (default: lmdb)
    /// - `GOODS_CACHE_PATH`: LMDB directory (default: ./data/goods-cache)
    /// - `GOODS_CACHE_MAX_MB`: LMDB map size (default: 64)
    /// - `GOODS_STORE_BACKEND`: `postgres` or `memory` (default: postgres)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unknown or malformed values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let cache_ttl = parsed("GOODS_CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let log_batch_size = parsed("GOODS_LOG_BATCH_SIZE")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.log_batch_size);

        let flush_policy = lookup("GOODS_LOG_FLUSH_POLICY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.flush_policy);

        let refill_queue = parsed("GOODS_REFILL_QUEUE")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.refill_queue);

        let bus_capacity = parsed("GOODS_BUS_CAPACITY")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.bus_capacity);

        let cache_backend = lookup("GOODS_CACHE_BACKEND")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_backend);

        let cache_path = lookup("GOODS_CACHE_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);

        let cache_max_mb = parsed("GOODS_CACHE_MAX_MB")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.cache_max_mb);

        let store_backend = lookup("GOODS_STORE_BACKEND")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.store_backend);

        Self {
            cache_ttl,
            log_batch_size,
            flush_policy,
            refill_queue,
            bus_capacity,
            cache_backend,
            cache_path,
            cache_max_mb,
            store_backend,
        }
    }

    /// Fully in-memory configuration for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            cache_backend: CacheBackend::Memory,
            store_backend: StoreBackend::Memory,
            ..Self::default()
        }
    }
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Upper bound on a single request, enforced by the router.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_API_BIND.to_string(),
            port: DEFAULT_API_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Environment variables:
    /// - `GOODS_API_BIND` (default: 0.0.0.0)
    /// - `GOODS_API_PORT` (default: 8080)
    /// - `GOODS_REQUEST_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: std::env::var("GOODS_API_BIND").unwrap_or(defaults.bind),
            port: std::env::var("GOODS_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            request_timeout: std::env::var("GOODS_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.log_batch_size, 25);
        assert_eq!(config.flush_policy, FlushPolicy::BeforeAppend);
        assert_eq!(config.cache_backend, CacheBackend::Lmdb);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_batch_size_falls_back_on_zero_or_garbage() {
        for raw in ["0", "many", "-3", ""] {
            let config = ServiceConfig::from_lookup(lookup(&[("GOODS_LOG_BATCH_SIZE", raw)]));
            assert_eq!(config.log_batch_size, 25, "value {:?}", raw);
        }
        let config = ServiceConfig::from_lookup(lookup(&[("GOODS_LOG_BATCH_SIZE", "100")]));
        assert_eq!(config.log_batch_size, 100);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("GOODS_CACHE_TTL_SECS", "5"),
            ("GOODS_LOG_FLUSH_POLICY", "on_capacity"),
            ("GOODS_CACHE_BACKEND", "MEMORY"),
            ("GOODS_STORE_BACKEND", "memory"),
            ("GOODS_CACHE_PATH", "/tmp/goods"),
        ]));
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
        assert_eq!(config.flush_policy, FlushPolicy::OnCapacity);
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cache_path, PathBuf::from("/tmp/goods"));
    }

    #[test]
    fn test_unknown_backend_keeps_default() {
        let config = ServiceConfig::from_lookup(lookup(&[("GOODS_CACHE_BACKEND", "redis")]));
        assert_eq!(config.cache_backend, CacheBackend::Lmdb);
    }

    #[test]
    fn test_server_addr() {
        let server = ServerConfig::default();
        assert_eq!(server.addr(), "0.0.0.0:8080");
    }
}
