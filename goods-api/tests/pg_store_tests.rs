#![cfg(feature = "db-tests")]
//! Postgres adapter tests. Require a reachable database configured through
//! the `GOODS_DB_*` variables.

use goods_api::db::PgGoodsStore;
use goods_storage::{AnalyticsStore, RelationalStore};
use goods_test_utils::assertions::assert_not_found;
use goods_test_utils::{
    ChangeKind, Good, GoodPatch, GoodsError, GoodsResult, LogEntry, Pagination, StorageError,
};

#[path = "support/db.rs"]
mod test_db_support;

/// A project id unlikely to collide with concurrent runs.
fn unique_project() -> i64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    1_000_000 + i64::from(nanos % 1_000_000)
}

async fn create_many(store: &PgGoodsStore, project_id: i64, n: usize) -> GoodsResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        ids.push(store.create_good(project_id, &format!("pg-{}", i)).await?.id);
    }
    Ok(ids)
}

fn priority_of(goods: &[Good], id: i64) -> i64 {
    goods
        .iter()
        .find(|g| g.id == id)
        .map(|g| g.priority)
        .expect("good is in the collection")
}

#[tokio::test]
async fn create_assigns_global_next_priority() -> GoodsResult<()> {
    let (store, _, _) = test_db_support::test_stores().await;
    let project_id = unique_project();

    let first = store.create_good(project_id, "first").await?;
    let second = store.create_good(project_id, "second").await?;
    assert!(second.id > first.id);
    assert!(second.priority > first.priority);
    assert!(!second.removed);
    Ok(())
}

#[tokio::test]
async fn update_and_delete_respect_project_and_removed() -> GoodsResult<()> {
    let (store, _, _) = test_db_support::test_stores().await;
    let project_id = unique_project();
    let good = store.create_good(project_id, "before").await?;

    let wrong_project = store
        .update_good(&GoodPatch::new("x"), good.id, project_id + 1)
        .await;
    assert_not_found(&wrong_project, good.id, project_id + 1);

    let updated = store
        .update_good(&GoodPatch::new("after").with_description("d"), good.id, project_id)
        .await?;
    assert_eq!(updated.name, "after");
    assert_eq!(updated.description.as_deref(), Some("d"));

    let removed = store.delete_good(good.id, project_id).await?;
    assert!(removed.removed);
    assert_eq!(removed.priority, good.priority);

    let after_delete = store
        .update_good(&GoodPatch::new("again"), good.id, project_id)
        .await;
    assert_not_found(&after_delete, good.id, project_id);
    Ok(())
}

#[tokio::test]
async fn reprioritize_shifts_anchor_and_later_ids() -> GoodsResult<()> {
    let _turn = test_db_support::reprioritize_guard();
    let (store, _, _) = test_db_support::test_stores().await;
    let project_id = unique_project();
    let ids = create_many(&store, project_id, 4).await?;
    let before = store.goods().await?;

    let changes = store.reprioritize_good(ids[1], project_id, 10).await?;
    for id in &ids[1..] {
        let old = before.iter().find(|g| g.id == *id).map(|g| g.priority);
        let new = changes.iter().find(|c| c.id == *id).map(|c| c.priority);
        assert_eq!(new, old.map(|p| p + 10));
    }
    assert!(changes.iter().all(|c| c.id >= ids[1]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reprioritize_applies_each_committed_delta_once() -> GoodsResult<()> {
    let _turn = test_db_support::reprioritize_guard();
    let (store, _, _) = test_db_support::test_stores().await;
    let project_id = unique_project();
    let ids = create_many(&store, project_id, 6).await?;
    let before = store.goods().await?;

    // (anchor index, delta); distinct powers of ten keep every outcome
    // distinguishable in the final sums.
    let calls = [(0, 1), (1, 10), (2, 100), (3, 1_000), (1, 10_000), (4, 100_000)];
    let handles: Vec<_> = calls
        .iter()
        .map(|&(anchor, delta)| {
            let store = store.clone();
            let good_id = ids[anchor];
            tokio::spawn(async move {
                let result = store.reprioritize_good(good_id, project_id, delta).await;
                (anchor, delta, result)
            })
        })
        .collect();

    let mut applied = vec![0i64; ids.len()];
    for handle in handles {
        let (anchor, delta, result) = handle.await.expect("task should not panic");
        match result {
            Ok(changes) => {
                assert!(changes.iter().all(|c| c.id >= ids[anchor]));
                for shift in &mut applied[anchor..] {
                    *shift += delta;
                }
            }
            Err(GoodsError::Storage(StorageError::Transaction { .. })) => {}
            Err(other) => panic!("unexpected reprioritize failure: {}", other),
        }
    }

    let after = store.goods().await?;
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(
            priority_of(&after, *id),
            priority_of(&before, *id) + applied[i],
            "good {}",
            id
        );
    }
    Ok(())
}

#[tokio::test]
async fn reprioritize_missing_anchor_is_not_found() -> GoodsResult<()> {
    let (store, _, _) = test_db_support::test_stores().await;
    let project_id = unique_project();
    let ids = create_many(&store, project_id, 1).await?;

    let result = store.reprioritize_good(ids[0], project_id + 1, 5).await;
    assert_not_found(&result, ids[0], project_id + 1);
    Ok(())
}

#[tokio::test]
async fn paged_read_reports_collection_counts() -> GoodsResult<()> {
    let (store, _, _) = test_db_support::test_stores().await;
    create_many(&store, unique_project(), 3).await?;

    let page = store.paged_goods(Pagination::new(2, 0)).await?;
    let all = store.goods().await?;
    assert_eq!(page.meta.total, all.len() as u64);
    assert_eq!(
        page.meta.removed,
        all.iter().filter(|g| g.removed).count() as u64
    );
    assert!(page.goods.len() <= 2);
    Ok(())
}

#[tokio::test]
async fn analytics_batch_is_written_in_one_transaction() -> GoodsResult<()> {
    let (_, analytics, pool) = test_db_support::test_stores().await;
    let good_id = unique_project();
    let rows = vec![
        LogEntry {
            action: ChangeKind::Created,
            good_id,
            project_id: Some(1),
            name: Some("a".to_string()),
            description: None,
            priority: 1,
            removed: Some(false),
        },
        LogEntry {
            action: ChangeKind::Reprioritized,
            good_id,
            project_id: None,
            name: None,
            description: None,
            priority: 2,
            removed: None,
        },
    ];

    analytics.append_batch(&rows).await?;

    let conn = pool.get().await.expect("connection");
    let count: i64 = conn
        .query_one("SELECT COUNT(*) FROM goods_log WHERE good_id = $1", &[&good_id])
        .await
        .expect("count query")
        .get(0);
    assert_eq!(count, 2);
    Ok(())
}
