//! Process-local snapshot cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use goods_core::{GoodsError, GoodsPage, GoodsResult, Pagination, StorageError};

use super::snapshot::decode_snapshot;
use super::CacheStats;
use crate::traits::CacheStore;

struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entry: Option<Entry>,
    stats: CacheStats,
}

/// In-memory snapshot cache with a fixed TTL.
///
/// Stores the serialized blob exactly as handed to [`CacheStore::set`], so
/// reads exercise the same decode path as the LMDB backend.
pub struct InMemorySnapshotCache {
    ttl: Duration,
    inner: RwLock<Inner>,
    failing: AtomicBool,
}

impl InMemorySnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Inner::default()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Make every subsequent operation fail with a cache error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Raw snapshot bytes if a live snapshot exists.
    pub fn snapshot_bytes(&self) -> Option<Vec<u8>> {
        let inner = self.inner.read().ok()?;
        inner
            .entry
            .as_ref()
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.bytes.clone())
    }

    fn check_failing(&self) -> GoodsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Cache {
                reason: "cache unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn poisoned() -> GoodsError {
    StorageError::Cache {
        reason: "cache lock poisoned".to_string(),
    }
    .into()
}

#[async_trait]
impl CacheStore for InMemorySnapshotCache {
    async fn set(&self, snapshot: &[u8]) -> GoodsResult<()> {
        self.check_failing()?;
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.entry = Some(Entry {
            bytes: snapshot.to_vec(),
            expires_at: Instant::now() + self.ttl,
        });
        inner.stats.writes += 1;
        inner.stats.snapshot_bytes = snapshot.len() as u64;
        Ok(())
    }

    async fn get(&self, pagination: Pagination) -> GoodsResult<GoodsPage> {
        self.check_failing()?;
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        let live = match inner.entry.as_ref() {
            Some(entry) if entry.expires_at > Instant::now() => Some(decode_snapshot(&entry.bytes)),
            _ => None,
        };

        match live {
            Some(decoded) => {
                inner.stats.hits += 1;
                let goods = decoded?;
                Ok(GoodsPage::from_snapshot(&goods, pagination))
            }
            None => {
                // Expired entries are dropped on the read that notices them.
                inner.entry = None;
                inner.stats.snapshot_bytes = 0;
                inner.stats.misses += 1;
                Err(GoodsError::CacheMiss)
            }
        }
    }

    async fn delete(&self) -> GoodsResult<()> {
        self.check_failing()?;
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.entry = None;
        inner.stats.invalidations += 1;
        inner.stats.snapshot_bytes = 0;
        Ok(())
    }

    async fn stats(&self) -> GoodsResult<CacheStats> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.stats.clone())
    }
}
