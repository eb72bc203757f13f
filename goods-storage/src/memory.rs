//! In-memory store adapters.
//!
//! Used by the test suites and by `GOODS_STORE_BACKEND=memory` runs. Each
//! store serializes its mutations behind a single lock, which gives the same
//! all-or-nothing behaviour the Postgres adapters get from transactions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use goods_core::{
    next_priority, shift_priorities, Good, GoodId, GoodPatch, GoodsError, GoodsPage, GoodsResult,
    LogEntry, Pagination, PriorityChange, ProjectId, StorageError, Timestamp,
};

use crate::traits::{AnalyticsStore, RelationalStore};

// ============================================================================
// RELATIONAL STORE
// ============================================================================

#[derive(Debug, Default)]
struct GoodsTable {
    rows: BTreeMap<GoodId, Good>,
    next_id: GoodId,
}

/// In-memory relational store keyed by id.
///
/// Rows are kept in a `BTreeMap` so iteration order is the id order every
/// read path promises.
#[derive(Debug, Default)]
pub struct InMemoryGoodsStore {
    table: RwLock<GoodsTable>,
    failing: AtomicBool,
}

impl InMemoryGoodsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert fixture rows as-is. Later creates get ids past the largest one.
    pub fn seed(&self, goods: impl IntoIterator<Item = Good>) -> GoodsResult<()> {
        let mut table = self.table.write().map_err(|_| poisoned())?;
        for good in goods {
            table.next_id = table.next_id.max(good.id);
            table.rows.insert(good.id, good);
        }
        Ok(())
    }

    /// Make every subsequent operation fail with a query error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failing(&self) -> GoodsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Query {
                reason: "relational store unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn poisoned() -> GoodsError {
    StorageError::Transaction {
        reason: "store lock poisoned".to_string(),
    }
    .into()
}

/// Look up a live row owned by `project_id`.
fn live_row_mut(
    table: &mut GoodsTable,
    good_id: GoodId,
    project_id: ProjectId,
) -> GoodsResult<&mut Good> {
    table
        .rows
        .get_mut(&good_id)
        .filter(|g| g.project_id == project_id && !g.removed)
        .ok_or_else(|| GoodsError::not_found(good_id, project_id))
}

#[async_trait]
impl RelationalStore for InMemoryGoodsStore {
    async fn paged_goods(&self, pagination: Pagination) -> GoodsResult<GoodsPage> {
        self.check_failing()?;
        let table = self.table.read().map_err(|_| poisoned())?;
        let snapshot: Vec<Good> = table.rows.values().cloned().collect();
        Ok(GoodsPage::from_snapshot(&snapshot, pagination))
    }

    async fn goods(&self) -> GoodsResult<Vec<Good>> {
        self.check_failing()?;
        let table = self.table.read().map_err(|_| poisoned())?;
        Ok(table.rows.values().cloned().collect())
    }

    async fn create_good(&self, project_id: ProjectId, name: &str) -> GoodsResult<Good> {
        self.check_failing()?;
        let mut table = self.table.write().map_err(|_| poisoned())?;

        table.next_id += 1;
        let good = Good {
            id: table.next_id,
            project_id,
            name: name.to_string(),
            description: None,
            priority: next_priority(table.rows.values().map(|g| g.priority)),
            removed: false,
            created_at: Utc::now(),
        };
        table.rows.insert(good.id, good.clone());
        Ok(good)
    }

    async fn update_good(
        &self,
        patch: &GoodPatch,
        good_id: GoodId,
        project_id: ProjectId,
    ) -> GoodsResult<Good> {
        self.check_failing()?;
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let good = live_row_mut(&mut table, good_id, project_id)?;
        patch.apply(good);
        Ok(good.clone())
    }

    async fn delete_good(&self, good_id: GoodId, project_id: ProjectId) -> GoodsResult<Good> {
        self.check_failing()?;
        let mut table = self.table.write().map_err(|_| poisoned())?;
        let good = live_row_mut(&mut table, good_id, project_id)?;
        good.removed = true;
        Ok(good.clone())
    }

    async fn reprioritize_good(
        &self,
        good_id: GoodId,
        project_id: ProjectId,
        delta: i64,
    ) -> GoodsResult<Vec<PriorityChange>> {
        self.check_failing()?;
        let mut table = self.table.write().map_err(|_| poisoned())?;

        let anchor_exists = table
            .rows
            .get(&good_id)
            .is_some_and(|g| g.project_id == project_id);
        if !anchor_exists {
            return Err(GoodsError::not_found(good_id, project_id));
        }

        let mut affected: Vec<Good> = table.rows.range(good_id..).map(|(_, g)| g.clone()).collect();
        let changes = shift_priorities(&mut affected, good_id, delta);
        for good in affected {
            table.rows.insert(good.id, good);
        }
        Ok(changes)
    }
}

// ============================================================================
// ANALYTICS STORE
// ============================================================================

/// An audit row as persisted, with its insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLogEntry {
    pub entry: LogEntry,
    pub event_time: Timestamp,
}

/// In-memory append-only audit log that remembers batch boundaries.
#[derive(Debug, Default)]
pub struct InMemoryAnalyticsStore {
    batches: RwLock<Vec<Vec<StoredLogEntry>>>,
    failing: AtomicBool,
    attempts: AtomicU64,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail without storing anything.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Committed batches in insertion order.
    pub fn batches(&self) -> Vec<Vec<StoredLogEntry>> {
        self.batches.read().map(|b| b.clone()).unwrap_or_default()
    }

    /// Every committed row, flattened.
    pub fn rows(&self) -> Vec<StoredLogEntry> {
        self.batches().into_iter().flatten().collect()
    }

    /// Number of committed batches.
    pub fn flush_count(&self) -> usize {
        self.batches.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Number of `append_batch` calls, failed ones included.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn append_batch(&self, rows: &[LogEntry]) -> GoodsResult<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Transaction {
                reason: "analytics store unavailable".to_string(),
            }
            .into());
        }

        let event_time = Utc::now();
        let batch = rows
            .iter()
            .cloned()
            .map(|entry| StoredLogEntry { entry, event_time })
            .collect();

        self.batches
            .write()
            .map_err(|_| poisoned())?
            .push(batch);
        Ok(())
    }
}
