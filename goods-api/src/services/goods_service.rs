//! Goods Service
//!
//! Orchestrates the four stores on every operation:
//!
//! - Reads go to the snapshot cache first. A miss falls through to the
//!   relational store and queues a background refill.
//! - Writes commit to the relational store, then publish a change event and
//!   invalidate the snapshot. Neither follow-up can fail the write.

use std::sync::Arc;

use goods_core::{
    ChangeEvent, Good, GoodId, GoodPatch, GoodsError, GoodsPage, GoodsResult, Pagination,
    PriorityChange, ProjectId,
};
use goods_storage::{CacheStore, MessageBus, RelationalStore};

use crate::jobs::CacheRefiller;
use crate::validation::ValidateNonEmpty;

/// Cache-aside read path plus write-and-propagate mutations.
#[derive(Clone)]
pub struct GoodsService {
    relational: Arc<dyn RelationalStore>,
    cache: Arc<dyn CacheStore>,
    bus: Arc<dyn MessageBus>,
    refiller: CacheRefiller,
}

impl GoodsService {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        cache: Arc<dyn CacheStore>,
        bus: Arc<dyn MessageBus>,
        refiller: CacheRefiller,
    ) -> Self {
        Self {
            relational,
            cache,
            bus,
            refiller,
        }
    }

    pub fn refiller(&self) -> &CacheRefiller {
        &self.refiller
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// One page of goods with collection-wide counters.
    pub async fn goods(&self, pagination: Pagination) -> GoodsResult<GoodsPage> {
        match self.cache.get(pagination).await {
            Ok(page) => {
                tracing::debug!(
                    limit = pagination.limit,
                    offset = pagination.offset,
                    "Served goods from snapshot cache"
                );
                return Ok(page);
            }
            Err(GoodsError::CacheMiss) => {
                tracing::debug!("Snapshot cache miss, reading relational store");
            }
            Err(e) => {
                tracing::error!(error = %e, "Snapshot cache read failed");
                return Err(e);
            }
        }

        let page = self.relational.paged_goods(pagination).await?;
        self.refiller.request();
        Ok(page)
    }

    // ========================================================================
    // WRITE PATHS
    // ========================================================================

    pub async fn create_good(&self, project_id: ProjectId, name: &str) -> GoodsResult<Good> {
        name.validate_non_empty("name")?;

        let good = self.relational.create_good(project_id, name).await?;
        tracing::info!(
            good_id = good.id,
            project_id = project_id,
            priority = good.priority,
            "Good created"
        );

        self.propagate(ChangeEvent::Created { good: good.clone() })
            .await;
        Ok(good)
    }

    pub async fn update_good(
        &self,
        patch: &GoodPatch,
        good_id: GoodId,
        project_id: ProjectId,
    ) -> GoodsResult<Good> {
        patch.name.validate_non_empty("name")?;

        let good = self
            .relational
            .update_good(patch, good_id, project_id)
            .await?;
        tracing::info!(good_id = good_id, project_id = project_id, "Good updated");

        self.propagate(ChangeEvent::Updated { good: good.clone() })
            .await;
        Ok(good)
    }

    pub async fn delete_good(&self, good_id: GoodId, project_id: ProjectId) -> GoodsResult<Good> {
        let good = self.relational.delete_good(good_id, project_id).await?;
        tracing::info!(good_id = good_id, project_id = project_id, "Good removed");

        self.propagate(ChangeEvent::Removed { good: good.clone() })
            .await;
        Ok(good)
    }

    pub async fn reprioritize_good(
        &self,
        good_id: GoodId,
        project_id: ProjectId,
        delta: i64,
    ) -> GoodsResult<Vec<PriorityChange>> {
        let changes = self
            .relational
            .reprioritize_good(good_id, project_id, delta)
            .await?;
        tracing::info!(
            good_id = good_id,
            project_id = project_id,
            delta = delta,
            shifted = changes.len(),
            "Goods reprioritized"
        );

        self.propagate(ChangeEvent::Reprioritized {
            changes: changes.clone(),
        })
        .await;
        Ok(changes)
    }

    /// Publish the change and drop the snapshot. Failures are logged only;
    /// the relational commit already happened.
    async fn propagate(&self, event: ChangeEvent) {
        let kind = event.kind();

        match event.encode() {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(payload).await {
                    tracing::warn!(kind = %kind, error = %e, "Failed to publish change event");
                }
            }
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to encode change event");
            }
        }

        if let Err(e) = self.cache.delete().await {
            tracing::warn!(kind = %kind, error = %e, "Failed to invalidate snapshot cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures_util::StreamExt;
    use goods_core::ChangeKind;
    use goods_storage::{FanoutBus, InMemoryGoodsStore, InMemorySnapshotCache};
    use std::time::Duration;
    use tokio::sync::watch;

    struct Harness {
        service: GoodsService,
        store: Arc<InMemoryGoodsStore>,
        cache: Arc<InMemorySnapshotCache>,
        bus: Arc<FanoutBus>,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn harness(seed: i64) -> Harness {
        let store = Arc::new(InMemoryGoodsStore::new());
        store
            .seed((1..=seed).map(|id| Good {
                id,
                project_id: 1,
                name: format!("g{}", id),
                description: None,
                priority: id,
                removed: false,
                created_at: Utc::now(),
            }))
            .expect("seed should succeed");
        let cache = Arc::new(InMemorySnapshotCache::new(Duration::from_secs(60)));
        let bus = Arc::new(FanoutBus::new(16));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (refiller, _handle) =
            CacheRefiller::spawn(store.clone(), cache.clone(), 4, shutdown_rx);

        Harness {
            service: GoodsService::new(store.clone(), cache.clone(), bus.clone(), refiller),
            store,
            cache,
            bus,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn wait_for_snapshot(cache: &InMemorySnapshotCache) {
        for _ in 0..200 {
            if cache.snapshot_bytes().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("snapshot was never refilled");
    }

    #[tokio::test]
    async fn test_miss_reads_store_and_queues_refill() -> GoodsResult<()> {
        let h = harness(3);

        let page = h.service.goods(Pagination::new(2, 0)).await?;
        assert_eq!(page.goods.len(), 2);
        assert_eq!(page.meta.total, 3);

        wait_for_snapshot(&h.cache).await;
        assert_eq!(h.service.refiller().metrics().refills, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_hit_does_not_touch_store() -> GoodsResult<()> {
        let h = harness(2);
        h.service.goods(Pagination::default()).await?;
        wait_for_snapshot(&h.cache).await;

        h.store.set_failing(true);
        let page = h.service.goods(Pagination::default()).await?;
        assert_eq!(page.meta.total, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_failure_is_not_treated_as_miss() {
        let h = harness(1);
        h.cache.set_failing(true);

        let err = h
            .service
            .goods(Pagination::default())
            .await
            .expect_err("cache is failing");
        assert!(matches!(err, GoodsError::Storage(_)));
        assert_eq!(h.service.refiller().metrics().requested, 0);
    }

    #[tokio::test]
    async fn test_create_publishes_and_invalidates() -> GoodsResult<()> {
        let h = harness(2);
        h.service.goods(Pagination::default()).await?;
        wait_for_snapshot(&h.cache).await;
        let mut events = h.bus.subscribe()?;

        let good = h.service.create_good(7, "Widget").await?;
        assert_eq!(good.priority, 3);
        assert!(h.cache.snapshot_bytes().is_none());

        let payload = events.next().await.expect("event published");
        let event = ChangeEvent::decode(&payload)?;
        assert_eq!(event.kind(), ChangeKind::Created);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let h = harness(0);
        let err = h
            .service
            .create_good(1, "   ")
            .await
            .expect_err("blank name");
        assert!(matches!(err, GoodsError::Validation { .. }));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_write_survives_publish_and_invalidate_failures() -> GoodsResult<()> {
        let h = harness(1);
        h.bus.set_failing(true);
        h.cache.set_failing(true);

        let removed = h.service.delete_good(1, 1).await?;
        assert!(removed.removed);
        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_skips_propagation() -> GoodsResult<()> {
        let h = harness(1);
        h.service.goods(Pagination::default()).await?;
        wait_for_snapshot(&h.cache).await;

        let err = h
            .service
            .update_good(&GoodPatch::new("x"), 99, 1)
            .await
            .expect_err("missing good");
        assert!(err.is_not_found());
        assert!(h.cache.snapshot_bytes().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_reprioritize_returns_shifted_goods() -> GoodsResult<()> {
        let h = harness(4);
        let changes = h.service.reprioritize_good(2, 1, 10).await?;
        assert_eq!(
            changes,
            vec![
                PriorityChange { id: 2, priority: 12 },
                PriorityChange { id: 3, priority: 13 },
                PriorityChange { id: 4, priority: 14 },
            ]
        );
        Ok(())
    }
}
