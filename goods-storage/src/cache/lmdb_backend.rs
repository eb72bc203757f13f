//! LMDB-backed snapshot cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep the goods snapshot
//! in a memory-mapped store that survives process restarts.
//!
//! # Value Format
//!
//! `[expires_at: 8 bytes, little-endian unix millis][json snapshot]`
//!
//! LMDB has no native expiry, so the deadline is written next to the value
//! and checked on every read. An expired value reads as a miss and is
//! overwritten by the next refill.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use goods_core::{GoodsError, GoodsPage, GoodsResult, Pagination, StorageError, SNAPSHOT_CACHE_KEY};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::snapshot::decode_snapshot;
use super::CacheStats;
use crate::traits::CacheStore;

const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt entry: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for GoodsError {
    fn from(e: LmdbCacheError) -> Self {
        GoodsError::Storage(StorageError::Cache {
            reason: e.to_string(),
        })
    }
}

/// LMDB-backed snapshot cache with a fixed TTL.
///
/// # Example
///
/// ```ignore
/// use goods_storage::cache::LmdbSnapshotCache;
/// use std::time::Duration;
///
/// let cache = LmdbSnapshotCache::new("/var/lib/goods/cache", 64, Duration::from_secs(60))?;
/// cache.set(&encoded_snapshot).await?;
/// let page = cache.get(Pagination::new(10, 0)).await?;
/// ```
pub struct LmdbSnapshotCache {
    env: Env,
    db: Database<Bytes, Bytes>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl LmdbSnapshotCache {
    /// Open (or create) the cache environment at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment/database cannot be opened.
    pub fn new<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        ttl: Duration,
    ) -> Result<Self, LmdbCacheError> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                LmdbCacheError::EnvOpen(format!("map size of {} MB overflows", max_size_mb))
            })?;

        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the files are not truncated or modified by anything else.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            ttl,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key() -> &'static [u8] {
        SNAPSHOT_CACHE_KEY.as_bytes()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    /// Read the raw entry, returning `None` when absent or expired.
    fn read_live(&self) -> Result<Option<Vec<u8>>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let Some(bytes) = self
            .db
            .get(&rtxn, Self::key())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
        else {
            return Ok(None);
        };

        if bytes.len() < HEADER_LEN {
            return Err(LmdbCacheError::Corrupt(format!(
                "entry of {} bytes has no expiry header",
                bytes.len()
            )));
        }

        let header: [u8; HEADER_LEN] = bytes[..HEADER_LEN]
            .try_into()
            .map_err(|_| LmdbCacheError::Corrupt("invalid expiry header".into()))?;
        let expires_at_millis = i64::from_le_bytes(header);

        if expires_at_millis <= Utc::now().timestamp_millis() {
            return Ok(None);
        }

        Ok(Some(bytes[HEADER_LEN..].to_vec()))
    }
}

#[async_trait]
impl CacheStore for LmdbSnapshotCache {
    async fn set(&self, snapshot: &[u8]) -> GoodsResult<()> {
        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        let mut value = Vec::with_capacity(HEADER_LEN + snapshot.len());
        value.extend_from_slice(&expires_at.to_le_bytes());
        value.extend_from_slice(snapshot);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, Self::key(), &value)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|s| {
            s.writes += 1;
            s.snapshot_bytes = snapshot.len() as u64;
        });
        Ok(())
    }

    async fn get(&self, pagination: Pagination) -> GoodsResult<GoodsPage> {
        match self.read_live()? {
            Some(bytes) => {
                self.record(|s| s.hits += 1);
                let goods = decode_snapshot(&bytes)?;
                Ok(GoodsPage::from_snapshot(&goods, pagination))
            }
            None => {
                self.record(|s| s.misses += 1);
                Err(GoodsError::CacheMiss)
            }
        }
    }

    async fn delete(&self) -> GoodsResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .delete(&mut wtxn, Self::key())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.record(|s| {
            s.invalidations += 1;
            s.snapshot_bytes = 0;
        });
        Ok(())
    }

    async fn stats(&self) -> GoodsResult<CacheStats> {
        self.stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| {
                StorageError::Cache {
                    reason: "stats lock poisoned".to_string(),
                }
                .into()
            })
    }
}
