//! Adapter contracts for the four stores the orchestration core talks to.
//!
//! The service never sees drivers directly; it composes one implementation
//! of each trait. In-memory implementations live next to these traits,
//! Postgres implementations live in the API crate.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use goods_core::{
    Good, GoodId, GoodPatch, GoodsPage, GoodsResult, LogEntry, Pagination, PriorityChange,
    ProjectId,
};

use crate::cache::CacheStats;

/// System of record for goods.
///
/// Every mutation is atomic. `NotFound` is reported as
/// [`goods_core::GoodsError::NotFound`]; anything else is a storage failure.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Fetch one page ordered by id, with `total`/`removed` counted over the
    /// whole table inside the same transaction.
    async fn paged_goods(&self, pagination: Pagination) -> GoodsResult<GoodsPage>;

    /// Fetch the full, unpaged collection ordered by id.
    async fn goods(&self) -> GoodsResult<Vec<Good>>;

    /// Insert a good with priority `max(existing) + 1`.
    async fn create_good(&self, project_id: ProjectId, name: &str) -> GoodsResult<Good>;

    /// Patch a live (non-removed) good owned by `project_id`.
    async fn update_good(
        &self,
        patch: &GoodPatch,
        good_id: GoodId,
        project_id: ProjectId,
    ) -> GoodsResult<Good>;

    /// Soft-delete a live good owned by `project_id`. Priority is untouched.
    async fn delete_good(&self, good_id: GoodId, project_id: ProjectId) -> GoodsResult<Good>;

    /// Add `delta` to every priority at or after the anchor's id.
    ///
    /// Returns the shifted rows in ascending id order. A missing anchor rolls
    /// the whole operation back.
    async fn reprioritize_good(
        &self,
        good_id: GoodId,
        project_id: ProjectId,
        delta: i64,
    ) -> GoodsResult<Vec<PriorityChange>>;
}

/// Holder of the denormalized goods snapshot.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store a serialized snapshot under the well-known key with the
    /// configured TTL, replacing any previous one.
    async fn set(&self, snapshot: &[u8]) -> GoodsResult<()>;

    /// Slice the cached snapshot.
    ///
    /// Returns [`goods_core::GoodsError::CacheMiss`] when no live snapshot
    /// exists; any other error means the cache itself failed.
    async fn get(&self, pagination: Pagination) -> GoodsResult<GoodsPage>;

    /// Drop the snapshot. Deleting an absent snapshot succeeds.
    async fn delete(&self) -> GoodsResult<()>;

    /// Hit/miss counters for observability.
    async fn stats(&self) -> GoodsResult<CacheStats>;
}

/// Stream of raw payloads delivered to one subscriber.
pub type BusSubscription = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// At-least-once fan-out channel for change events.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> GoodsResult<()>;

    /// Open a new subscription that sees every payload published after
    /// this call.
    fn subscribe(&self) -> GoodsResult<BusSubscription>;
}

/// Append-only audit log.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert every row or none of them.
    async fn append_batch(&self, rows: &[LogEntry]) -> GoodsResult<()>;
}
