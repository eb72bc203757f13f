//! Goods Test Utilities
//!
//! Centralized test infrastructure for the goods workspace:
//! - Proptest generators for entities and change events
//! - Test fixtures for common scenarios
//! - Custom assertions for goods-specific validation

// Re-export in-memory adapters from their source crate
pub use goods_storage::{
    FanoutBus, InMemoryAnalyticsStore, InMemoryGoodsStore, InMemorySnapshotCache,
    StoredLogEntry,
};

// Re-export core types for convenience
pub use goods_core::{
    ChangeEvent, ChangeKind, Good, GoodId, GoodPatch, GoodsError, GoodsMeta, GoodsPage,
    GoodsResult, LogEntry, Pagination, PriorityChange, ProjectId, StorageError, Timestamp,
};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating goods entity types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // Generate timestamps within a reasonable range (2020-2030)
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a non-empty good name.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,31}"
    }

    pub fn arb_project_id() -> impl Strategy<Value = ProjectId> {
        1i64..64
    }

    /// Generate a priority shift, negative values included.
    pub fn arb_delta() -> impl Strategy<Value = i64> {
        -1_000i64..1_000
    }

    pub fn arb_patch() -> impl Strategy<Value = GoodPatch> {
        (arb_name(), prop::option::of("[a-z ]{0,40}")).prop_map(|(name, description)| {
            GoodPatch { name, description }
        })
    }

    pub fn arb_pagination() -> impl Strategy<Value = Pagination> {
        (1u32..=50, 0u32..80).prop_map(|(limit, offset)| Pagination::new(limit, offset))
    }

    /// Generate a collection with ids `1..=len` and arbitrary fields.
    pub fn arb_collection(max_len: usize) -> impl Strategy<Value = Vec<Good>> {
        prop::collection::vec(
            (
                arb_project_id(),
                arb_name(),
                prop::option::of("[a-z ]{0,20}"),
                -100i64..100,
                any::<bool>(),
                arb_timestamp(),
            ),
            0..=max_len,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(
                    |(i, (project_id, name, description, priority, removed, created_at))| Good {
                        id: i as GoodId + 1,
                        project_id,
                        name,
                        description,
                        priority,
                        removed,
                        created_at,
                    },
                )
                .collect()
        })
    }

    /// Generate a single-row change event (created, updated or removed).
    pub fn arb_good_event() -> impl Strategy<Value = ChangeEvent> {
        (arb_collection(1).prop_filter("need one good", |g| !g.is_empty()), 0u8..3).prop_map(
            |(mut goods, kind)| {
                let good = goods.remove(0);
                match kind {
                    0 => ChangeEvent::Created { good },
                    1 => ChangeEvent::Updated { good },
                    _ => ChangeEvent::Removed { good },
                }
            },
        )
    }

    /// Generate any change event, reprioritizations included.
    pub fn arb_change_event() -> impl Strategy<Value = ChangeEvent> {
        prop_oneof![
            3 => arb_good_event(),
            1 => prop::collection::vec((1i64..1000, -1000i64..1000), 1..6).prop_map(|pairs| {
                ChangeEvent::Reprioritized {
                    changes: pairs
                        .into_iter()
                        .map(|(id, priority)| PriorityChange { id, priority })
                        .collect(),
                }
            }),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// A live good with `priority == id`.
    pub fn good(id: GoodId, project_id: ProjectId) -> Good {
        Good {
            id,
            project_id,
            name: format!("good-{}", id),
            description: None,
            priority: id,
            removed: false,
            created_at: Utc::now(),
        }
    }

    /// Goods `1..=n` in one project, priorities `1..=n`.
    pub fn sequential_goods(n: i64, project_id: ProjectId) -> Vec<Good> {
        (1..=n).map(|id| good(id, project_id)).collect()
    }

    /// A relational store pre-loaded with [`sequential_goods`].
    pub fn seeded_store(n: i64, project_id: ProjectId) -> GoodsResult<InMemoryGoodsStore> {
        let store = InMemoryGoodsStore::new();
        store.seed(sequential_goods(n, project_id))?;
        Ok(store)
    }

    /// Encoded single-row `created` event for good `id`.
    pub fn created_payload(id: GoodId) -> GoodsResult<Vec<u8>> {
        ChangeEvent::Created { good: good(id, 1) }.encode()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for goods-specific validation.

    use super::*;

    /// Assert that a GoodsResult is a NotFound error for the given pair.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(
        result: &GoodsResult<T>,
        good_id: GoodId,
        project_id: ProjectId,
    ) {
        match result {
            Err(GoodsError::NotFound {
                good_id: g,
                project_id: p,
            }) => {
                assert_eq!(*g, good_id, "Wrong good id in NotFound error");
                assert_eq!(*p, project_id, "Wrong project id in NotFound error");
            }
            other => panic!(
                "Expected NotFound({}, {}), got: {:?}",
                good_id, project_id, other
            ),
        }
    }

    /// Assert that a GoodsResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &GoodsResult<T>) {
        match result {
            Err(GoodsError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a page obeys the collection-wide metadata contract.
    #[track_caller]
    pub fn assert_page_consistent(page: &GoodsPage, collection: &[Good]) {
        assert_eq!(page.meta.total, collection.len() as u64, "total mismatch");
        assert_eq!(
            page.meta.removed,
            collection.iter().filter(|g| g.removed).count() as u64,
            "removed count mismatch"
        );
        assert!(
            page.goods.len() <= page.meta.limit as usize,
            "page holds {} goods, limit is {}",
            page.goods.len(),
            page.meta.limit
        );
        assert!(
            page.goods.windows(2).all(|w| w[0].id < w[1].id),
            "page is not in ascending id order"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sequential_fixture() {
        let goods = fixtures::sequential_goods(4, 7);
        assert_eq!(goods.len(), 4);
        assert!(goods.iter().all(|g| g.priority == g.id && g.project_id == 7));
    }

    proptest! {
        #[test]
        fn prop_generated_collection_has_sequential_ids(goods in generators::arb_collection(20)) {
            for (i, g) in goods.iter().enumerate() {
                prop_assert_eq!(g.id, i as GoodId + 1);
                prop_assert!(!g.name.is_empty());
            }
        }

        #[test]
        fn prop_snapshot_page_is_consistent(
            goods in generators::arb_collection(30),
            pagination in generators::arb_pagination(),
        ) {
            let page = GoodsPage::from_snapshot(&goods, pagination);
            assertions::assert_page_consistent(&page, &goods);
        }
    }
}
