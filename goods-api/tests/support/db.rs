use std::sync::{Mutex, MutexGuard};

use goods_api::db::{DbConfig, PgAnalyticsStore, PgGoodsStore};

/// Reprioritization shifts every later id in the shared table, so tests
/// that assert on shifted priorities take turns.
static REPRIORITIZE_LOCK: Mutex<()> = Mutex::new(());

pub fn reprioritize_guard() -> MutexGuard<'static, ()> {
    REPRIORITIZE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS goods (
    id          BIGSERIAL PRIMARY KEY,
    project_id  BIGINT      NOT NULL,
    name        TEXT        NOT NULL,
    description TEXT,
    priority    BIGINT      NOT NULL,
    removed     BOOLEAN     NOT NULL DEFAULT false,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS goods_log (
    action      TEXT        NOT NULL,
    good_id     BIGINT      NOT NULL,
    project_id  BIGINT,
    name        TEXT,
    description TEXT,
    priority    BIGINT      NOT NULL,
    removed     BOOLEAN,
    event_time  TIMESTAMPTZ NOT NULL DEFAULT now()
);";

pub async fn test_stores() -> (PgGoodsStore, PgAnalyticsStore, deadpool_postgres::Pool) {
    let pool = DbConfig::from_env()
        .create_pool()
        .expect("Failed to create database pool");
    let conn = pool.get().await.expect("Failed to connect to test database");
    conn.batch_execute(SCHEMA)
        .await
        .expect("Failed to create test schema");
    drop(conn);

    (
        PgGoodsStore::new(pool.clone()),
        PgAnalyticsStore::new(pool.clone()),
        pool,
    )
}
