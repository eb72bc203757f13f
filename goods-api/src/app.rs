//! Application wiring: backend selection, background jobs and shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use goods_core::GoodsError;
use goods_storage::{
    AnalyticsStore, CacheStore, FanoutBus, InMemoryAnalyticsStore, InMemoryGoodsStore,
    InMemorySnapshotCache, LmdbSnapshotCache, MessageBus, RelationalStore,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{CacheBackend, ServiceConfig, StoreBackend};
use crate::db::{DbConfig, PgAnalyticsStore, PgGoodsStore};
use crate::error::ApiResult;
use crate::jobs::{
    spawn_audit_ingest, CacheRefiller, IngestConfig, IngestHandle, IngestSnapshot, RefillMetrics,
    RefillSnapshot,
};
use crate::routes::create_api_router;
use crate::services::GoodsService;
use crate::state::AppState;
use crate::telemetry::ServiceMetrics;

// ============================================================================
// BACKENDS
// ============================================================================

/// The four stores the service composes.
#[derive(Clone)]
pub struct Backends {
    pub relational: Arc<dyn RelationalStore>,
    pub cache: Arc<dyn CacheStore>,
    pub bus: Arc<dyn MessageBus>,
    pub analytics: Arc<dyn AnalyticsStore>,
}

impl Backends {
    /// Open the backends selected by `config`. Postgres settings come from
    /// [`DbConfig::from_env`].
    pub fn from_config(config: &ServiceConfig) -> ApiResult<Self> {
        let cache: Arc<dyn CacheStore> = match config.cache_backend {
            CacheBackend::Lmdb => {
                let cache = LmdbSnapshotCache::new(
                    &config.cache_path,
                    config.cache_max_mb,
                    config.cache_ttl,
                )
                .map_err(GoodsError::from)?;
                tracing::info!(path = %config.cache_path.display(), "Opened LMDB snapshot cache");
                Arc::new(cache)
            }
            CacheBackend::Memory => Arc::new(InMemorySnapshotCache::new(config.cache_ttl)),
        };

        let (relational, analytics): (Arc<dyn RelationalStore>, Arc<dyn AnalyticsStore>) =
            match config.store_backend {
                StoreBackend::Postgres => {
                    let db_config = DbConfig::from_env();
                    let pool = db_config.create_pool()?;
                    tracing::info!(
                        host = %db_config.host,
                        dbname = %db_config.dbname,
                        "Created Postgres connection pool"
                    );
                    (
                        Arc::new(PgGoodsStore::new(pool.clone())),
                        Arc::new(PgAnalyticsStore::new(pool)),
                    )
                }
                StoreBackend::Memory => (
                    Arc::new(InMemoryGoodsStore::new()),
                    Arc::new(InMemoryAnalyticsStore::new()),
                ),
            };

        Ok(Self {
            relational,
            cache,
            bus: Arc::new(FanoutBus::new(config.bus_capacity)),
            analytics,
        })
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

/// Final counters reported once the background jobs have stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub refill: RefillSnapshot,
    pub ingest: IngestSnapshot,
}

/// A running service with its background jobs.
pub struct App {
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    refill: JoinHandle<Arc<RefillMetrics>>,
    ingest: IngestHandle,
}

impl App {
    /// Spawn the refill queue and the audit ingestion pipeline and build the
    /// service on top of `backends`. Must be called inside a Tokio runtime.
    pub fn start(backends: Backends, config: &ServiceConfig) -> ApiResult<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (refiller, refill) = CacheRefiller::spawn(
            Arc::clone(&backends.relational),
            Arc::clone(&backends.cache),
            config.refill_queue,
            shutdown_rx.clone(),
        );

        let ingest = spawn_audit_ingest(
            backends.bus.as_ref(),
            Arc::clone(&backends.analytics),
            IngestConfig::new(config.log_batch_size, config.flush_policy),
            shutdown_rx,
        )?;

        let metrics = ServiceMetrics::new(
            refiller.clone(),
            Arc::clone(&ingest.metrics),
            Arc::clone(&backends.cache),
        )?;

        let service = GoodsService::new(
            backends.relational,
            backends.cache,
            backends.bus,
            refiller,
        );

        tracing::info!(
            cache_ttl_secs = config.cache_ttl.as_secs(),
            log_batch_size = config.log_batch_size,
            flush_policy = ?config.flush_policy,
            "Goods service started"
        );

        Ok(Self {
            state: AppState::new(service, Arc::new(metrics)),
            shutdown_tx,
            refill,
            ingest,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn service(&self) -> &GoodsService {
        &self.state.service
    }

    pub fn router(&self, request_timeout: Duration) -> Router {
        create_api_router(self.state.clone(), request_timeout)
    }

    pub fn ingest_metrics(&self) -> IngestSnapshot {
        self.ingest.metrics.snapshot()
    }

    /// Signal every job to stop and wait for them. The ingestion consumer
    /// flushes whatever it still buffers before returning.
    pub async fn shutdown(self) -> ShutdownSummary {
        let _ = self.shutdown_tx.send(true);

        let refill = match self.refill.await {
            Ok(metrics) => metrics.snapshot(),
            Err(e) => {
                tracing::error!(error = %e, "Cache refill task panicked");
                self.state.service.refiller().metrics()
            }
        };

        if let Err(e) = self.ingest.forwarder.await {
            tracing::error!(error = %e, "Bus forwarder panicked");
        }
        let ingest = match self.ingest.consumer.await {
            Ok(metrics) => metrics.snapshot(),
            Err(e) => {
                tracing::error!(error = %e, "Audit ingest task panicked");
                self.ingest.metrics.snapshot()
            }
        };

        tracing::info!(
            refills = refill.refills,
            flushes = ingest.flushes,
            rows_flushed = ingest.rows_flushed,
            "Goods service stopped"
        );

        ShutdownSummary { refill, ingest }
    }
}
