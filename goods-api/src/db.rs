//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, plus the Postgres
//! implementations of the relational and analytics store contracts.
//!
//! Schema management is out of scope; the adapters expect these tables:
//!
//! ```sql
//! CREATE TABLE goods (
//!     id          BIGSERIAL PRIMARY KEY,
//!     project_id  BIGINT      NOT NULL,
//!     name        TEXT        NOT NULL,
//!     description TEXT,
//!     priority    BIGINT      NOT NULL,
//!     removed     BOOLEAN     NOT NULL DEFAULT false,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//!
//! CREATE TABLE goods_log (
//!     action      TEXT        NOT NULL,
//!     good_id     BIGINT      NOT NULL,
//!     project_id  BIGINT,
//!     name        TEXT,
//!     description TEXT,
//!     priority    BIGINT      NOT NULL,
//!     removed     BOOLEAN,
//!     event_time  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```

use crate::constants::{DEFAULT_DB_POOL_SIZE, DEFAULT_DB_TIMEOUT_SECS, REPRIORITIZE_MAX_ATTEMPTS};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use goods_core::{
    Good, GoodId, GoodPatch, GoodsError, GoodsMeta, GoodsPage, GoodsResult, LogEntry, Pagination,
    PriorityChange, ProjectId, StorageError,
};
use goods_storage::{AnalyticsStore, RelationalStore};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{IsolationLevel, NoTls, Row};

const SELECT_PAGE: &str = "SELECT id, project_id, name, description, priority, removed, created_at \
     FROM goods ORDER BY id LIMIT $1 OFFSET $2";

const SELECT_ALL: &str = "SELECT id, project_id, name, description, priority, removed, created_at \
     FROM goods ORDER BY id";

const INSERT_GOOD: &str = "INSERT INTO goods (project_id, name, priority) \
     SELECT $1, $2, COALESCE(MAX(priority), 0) + 1 FROM goods \
     RETURNING id, project_id, name, description, priority, removed, created_at";

const UPDATE_GOOD: &str = "UPDATE goods SET name = $1, description = COALESCE($2, description) \
     WHERE id = $3 AND project_id = $4 AND removed = false \
     RETURNING id, project_id, name, description, priority, removed, created_at";

const SOFT_DELETE_GOOD: &str = "UPDATE goods SET removed = true \
     WHERE id = $1 AND project_id = $2 AND removed = false \
     RETURNING id, project_id, name, description, priority, removed, created_at";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "goods".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Reads `GOODS_DB_HOST`, `GOODS_DB_PORT`, `GOODS_DB_NAME`,
    /// `GOODS_DB_USER`, `GOODS_DB_PASSWORD`, `GOODS_DB_POOL_SIZE` and
    /// `GOODS_DB_TIMEOUT`.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("GOODS_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("GOODS_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("GOODS_DB_NAME").unwrap_or_else(|_| "goods".to_string()),
            user: std::env::var("GOODS_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("GOODS_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("GOODS_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DB_POOL_SIZE),
            timeout: Duration::from_secs(
                std::env::var("GOODS_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DB_TIMEOUT_SECS),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: deadpool_postgres::PoolError) -> GoodsError {
    tracing::error!("Connection pool error: {:?}", err);
    StorageError::Connection {
        reason: err.to_string(),
    }
    .into()
}

fn query_error(operation: &'static str, err: tokio_postgres::Error) -> GoodsError {
    tracing::error!(operation = operation, "Database error: {:?}", err);
    StorageError::Query {
        reason: format!("{}: {}", operation, err),
    }
    .into()
}

fn is_serialization_failure(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::T_R_SERIALIZATION_FAILURE)
}

fn good_from_row(row: &Row) -> Good {
    Good {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        description: row.get("description"),
        priority: row.get("priority"),
        removed: row.get("removed"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// RELATIONAL STORE
// ============================================================================

/// Postgres-backed [`RelationalStore`] over the `goods` table.
#[derive(Clone)]
pub struct PgGoodsStore {
    pool: Pool,
}

/// Outcome of a single reprioritization attempt.
enum AttemptError {
    /// Serialization conflict; the whole transaction may be replayed.
    Retryable(tokio_postgres::Error),
    Fatal(GoodsError),
}

impl From<GoodsError> for AttemptError {
    fn from(err: GoodsError) -> Self {
        AttemptError::Fatal(err)
    }
}

fn attempt_error(operation: &'static str, err: tokio_postgres::Error) -> AttemptError {
    if is_serialization_failure(&err) {
        AttemptError::Retryable(err)
    } else {
        AttemptError::Fatal(query_error(operation, err))
    }
}

impl PgGoodsStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> GoodsResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn try_reprioritize(
        conn: &mut deadpool_postgres::Object,
        good_id: GoodId,
        project_id: ProjectId,
        delta: i64,
    ) -> Result<Vec<PriorityChange>, AttemptError> {
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await
            .map_err(|e| attempt_error("begin reprioritize", e))?;

        // Anchor lookup and shift in one statement; the anchor itself is
        // always shifted, so zero rows means it does not exist.
        let shifted = tx
            .execute(
                "UPDATE goods SET priority = priority + $3 \
                 WHERE id >= (SELECT id FROM goods WHERE id = $1 AND project_id = $2)",
                &[&good_id, &project_id, &delta],
            )
            .await
            .map_err(|e| attempt_error("shift priorities", e))?;

        if shifted == 0 {
            tx.rollback()
                .await
                .map_err(|e| attempt_error("rollback reprioritize", e))?;
            return Err(GoodsError::not_found(good_id, project_id).into());
        }

        let rows = tx
            .query(
                "SELECT id, priority FROM goods WHERE id >= $1 ORDER BY id",
                &[&good_id],
            )
            .await
            .map_err(|e| attempt_error("read back priorities", e))?;

        tx.commit()
            .await
            .map_err(|e| attempt_error("commit reprioritize", e))?;

        Ok(rows
            .iter()
            .map(|row| PriorityChange {
                id: row.get("id"),
                priority: row.get("priority"),
            })
            .collect())
    }
}

#[async_trait]
impl RelationalStore for PgGoodsStore {
    async fn paged_goods(&self, pagination: Pagination) -> GoodsResult<GoodsPage> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(|e| query_error("begin paged read", e))?;

        let rows = tx
            .query(
                SELECT_PAGE,
                &[&i64::from(pagination.limit), &i64::from(pagination.offset)],
            )
            .await
            .map_err(|e| query_error("select page", e))?;

        let counts = tx
            .query_one(
                "SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE removed) AS removed FROM goods",
                &[],
            )
            .await
            .map_err(|e| query_error("count goods", e))?;

        tx.commit()
            .await
            .map_err(|e| query_error("commit paged read", e))?;

        let total: i64 = counts.get("total");
        let removed: i64 = counts.get("removed");

        Ok(GoodsPage {
            meta: GoodsMeta {
                limit: pagination.limit,
                offset: pagination.offset,
                total: total.max(0) as u64,
                removed: removed.max(0) as u64,
            },
            goods: rows.iter().map(good_from_row).collect(),
        })
    }

    async fn goods(&self) -> GoodsResult<Vec<Good>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(SELECT_ALL, &[])
            .await
            .map_err(|e| query_error("select goods", e))?;
        Ok(rows.iter().map(good_from_row).collect())
    }

    async fn create_good(&self, project_id: ProjectId, name: &str) -> GoodsResult<Good> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(INSERT_GOOD, &[&project_id, &name])
            .await
            .map_err(|e| query_error("insert good", e))?;
        Ok(good_from_row(&row))
    }

    async fn update_good(
        &self,
        patch: &GoodPatch,
        good_id: GoodId,
        project_id: ProjectId,
    ) -> GoodsResult<Good> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                UPDATE_GOOD,
                &[&patch.name, &patch.description, &good_id, &project_id],
            )
            .await
            .map_err(|e| query_error("update good", e))?;

        row.map(|r| good_from_row(&r))
            .ok_or_else(|| GoodsError::not_found(good_id, project_id))
    }

    async fn delete_good(&self, good_id: GoodId, project_id: ProjectId) -> GoodsResult<Good> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(SOFT_DELETE_GOOD, &[&good_id, &project_id])
            .await
            .map_err(|e| query_error("soft delete good", e))?;

        row.map(|r| good_from_row(&r))
            .ok_or_else(|| GoodsError::not_found(good_id, project_id))
    }

    async fn reprioritize_good(
        &self,
        good_id: GoodId,
        project_id: ProjectId,
        delta: i64,
    ) -> GoodsResult<Vec<PriorityChange>> {
        let mut conn = self.get_conn().await?;
        let mut attempt = 1;

        loop {
            match Self::try_reprioritize(&mut conn, good_id, project_id, delta).await {
                Ok(changes) => return Ok(changes),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Retryable(err)) if attempt < REPRIORITIZE_MAX_ATTEMPTS => {
                    tracing::warn!(
                        good_id = good_id,
                        attempt = attempt,
                        error = %err,
                        "Reprioritize hit a serialization conflict, retrying"
                    );
                    attempt += 1;
                }
                Err(AttemptError::Retryable(err)) => {
                    tracing::error!(
                        good_id = good_id,
                        attempts = attempt,
                        "Reprioritize gave up after repeated serialization conflicts"
                    );
                    return Err(StorageError::Transaction {
                        reason: format!("serialization failure: {}", err),
                    }
                    .into());
                }
            }
        }
    }
}

// ============================================================================
// ANALYTICS STORE
// ============================================================================

/// Postgres-backed [`AnalyticsStore`] appending to `goods_log`.
#[derive(Clone)]
pub struct PgAnalyticsStore {
    pool: Pool,
}

impl PgAnalyticsStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn append_batch(&self, rows: &[LogEntry]) -> GoodsResult<()> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| query_error("begin log batch", e))?;

        let stmt = tx
            .prepare(
                "INSERT INTO goods_log \
                 (action, good_id, project_id, name, description, priority, removed, event_time) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
            )
            .await
            .map_err(|e| query_error("prepare log insert", e))?;

        for entry in rows {
            tx.execute(
                &stmt,
                &[
                    &entry.action.as_str(),
                    &entry.good_id,
                    &entry.project_id,
                    &entry.name,
                    &entry.description,
                    &entry.priority,
                    &entry.removed,
                ],
            )
            .await
            .map_err(|e| query_error("insert log row", e))?;
        }

        // Dropping the transaction on any error above rolls it back.
        tx.commit()
            .await
            .map_err(|e| query_error("commit log batch", e))?;

        tracing::debug!(rows = rows.len(), "Appended audit batch");
        Ok(())
    }
}
