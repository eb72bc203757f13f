//! Cache Refill Background Task
//!
//! After a read misses the snapshot cache and is served from the relational
//! store, the service asks for a refill: fetch the whole collection,
//! serialize it, and store it under the snapshot key with the standard TTL.
//!
//! Refills run on a dedicated task fed by a bounded queue so they outlive
//! the request that triggered them and never block it. A full queue means a
//! refill is already pending, so the request is dropped. Refill failures are
//! logged and counted, never surfaced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use goods_core::GoodsResult;
use goods_storage::{encode_snapshot, CacheStore, RelationalStore};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for refill activity.
#[derive(Debug, Default)]
pub struct RefillMetrics {
    /// Refill requests accepted onto the queue
    pub requested: AtomicU64,

    /// Refill requests dropped because the queue was full or closed
    pub dropped: AtomicU64,

    /// Snapshots written successfully
    pub refills: AtomicU64,

    /// Refills that failed to read, encode or store
    pub failures: AtomicU64,
}

impl RefillMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> RefillSnapshot {
        RefillSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of refill metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefillSnapshot {
    pub requested: u64,
    pub dropped: u64,
    pub refills: u64,
    pub failures: u64,
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cheap, cloneable handle for requesting refills.
#[derive(Clone)]
pub struct CacheRefiller {
    tx: mpsc::Sender<()>,
    metrics: Arc<RefillMetrics>,
}

impl CacheRefiller {
    /// Spawn the refill task and return a handle to it.
    ///
    /// The task stops when `shutdown_rx` flips to `true` or every handle has
    /// been dropped.
    pub fn spawn(
        relational: Arc<dyn RelationalStore>,
        cache: Arc<dyn CacheStore>,
        queue_capacity: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<Arc<RefillMetrics>>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(RefillMetrics::new());

        let handle = tokio::spawn(cache_refill_task(
            relational,
            cache,
            rx,
            shutdown_rx,
            Arc::clone(&metrics),
        ));

        (Self { tx, metrics }, handle)
    }

    /// Ask for a refill without waiting for it. Returns whether the request
    /// was queued.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                self.metrics.requested.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache refill already pending, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Cache refill task has stopped, request dropped");
                false
            }
        }
    }

    pub fn metrics(&self) -> RefillSnapshot {
        self.metrics.snapshot()
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

async fn cache_refill_task(
    relational: Arc<dyn RelationalStore>,
    cache: Arc<dyn CacheStore>,
    mut rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<RefillMetrics>,
) -> Arc<RefillMetrics> {
    tracing::info!("Cache refill task started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache refill task shutting down");
                    break;
                }
            }

            request = rx.recv() => {
                if request.is_none() {
                    break;
                }
                match refill_once(relational.as_ref(), cache.as_ref()).await {
                    Ok(count) => {
                        metrics.refills.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(goods = count, "Snapshot cache refilled");
                    }
                    Err(e) => {
                        metrics.failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "Snapshot cache refill failed");
                    }
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        requested = snapshot.requested,
        dropped = snapshot.dropped,
        refills = snapshot.refills,
        failures = snapshot.failures,
        "Cache refill task completed"
    );

    metrics
}

/// Rebuild the snapshot from the relational store. Returns the number of
/// goods written.
pub async fn refill_once(relational: &dyn RelationalStore, cache: &dyn CacheStore) -> GoodsResult<usize> {
    let goods = relational.goods().await?;
    let blob = encode_snapshot(&goods)?;
    cache.set(&blob).await?;
    Ok(goods.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use goods_core::{Good, Pagination};
    use goods_storage::{InMemoryGoodsStore, InMemorySnapshotCache};
    use std::time::Duration;

    fn seeded_store(n: i64) -> Arc<InMemoryGoodsStore> {
        let store = InMemoryGoodsStore::new();
        store
            .seed((1..=n).map(|id| Good {
                id,
                project_id: 1,
                name: format!("g{}", id),
                description: None,
                priority: id,
                removed: false,
                created_at: Utc::now(),
            }))
            .expect("seed should succeed");
        Arc::new(store)
    }

    async fn wait_for_refills(refiller: &CacheRefiller, expected: u64) {
        for _ in 0..200 {
            let m = refiller.metrics();
            if m.refills + m.failures >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("refill did not complete: {:?}", refiller.metrics());
    }

    #[tokio::test]
    async fn test_refill_once_writes_full_collection() -> GoodsResult<()> {
        let store = seeded_store(4);
        let cache = InMemorySnapshotCache::new(Duration::from_secs(60));

        let written = refill_once(store.as_ref(), &cache).await?;
        assert_eq!(written, 4);

        let page = cache.get(Pagination::new(2, 0)).await?;
        assert_eq!(page.meta.total, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_requested_refill_populates_cache() -> GoodsResult<()> {
        let store = seeded_store(3);
        let cache = Arc::new(InMemorySnapshotCache::new(Duration::from_secs(60)));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (refiller, _handle) = CacheRefiller::spawn(store, cache.clone(), 4, shutdown_rx);
        assert!(refiller.request());
        wait_for_refills(&refiller, 1).await;

        assert_eq!(cache.get(Pagination::new(10, 0)).await?.goods.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_refill_is_counted_not_raised() {
        let store = seeded_store(1);
        store.set_failing(true);
        let cache = Arc::new(InMemorySnapshotCache::new(Duration::from_secs(60)));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (refiller, _handle) = CacheRefiller::spawn(store, cache.clone(), 4, shutdown_rx);
        refiller.request();
        wait_for_refills(&refiller, 1).await;

        assert_eq!(refiller.metrics().failures, 1);
        assert!(cache.snapshot_bytes().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let store = seeded_store(1);
        let cache = Arc::new(InMemorySnapshotCache::new(Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (refiller, handle) = CacheRefiller::spawn(store, cache, 1, shutdown_rx);
        shutdown_tx.send(true).expect("task is listening");
        let metrics = handle.await.expect("task should not panic");
        assert_eq!(metrics.snapshot().refills, 0);

        assert!(!refiller.request());
    }
}
