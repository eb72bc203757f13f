//! Prometheus Metrics
//!
//! The background jobs and the snapshot cache keep their own counters. Each
//! app owns a registry; a scrape copies the current counter values into
//! gauges on that registry and encodes them for Prometheus.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use goods_storage::CacheStore;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{ApiError, ApiResult};
use crate::jobs::{CacheRefiller, IngestMetrics};

/// Gauges mirroring the service counters, plus the sources they mirror.
pub struct ServiceMetrics {
    registry: Registry,

    /// Refill requests by outcome - label: outcome
    refill_events: IntGaugeVec,

    /// Audit ingestion activity - label: kind
    ingest_events: IntGaugeVec,

    /// Snapshot cache activity - label: kind
    cache_events: IntGaugeVec,

    /// Size of the live snapshot
    cache_snapshot_bytes: IntGauge,

    refiller: CacheRefiller,
    ingest: Arc<IngestMetrics>,
    cache: Arc<dyn CacheStore>,
}

fn labelled(registry: &Registry, name: &str, help: &str, label: &str) -> ApiResult<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), &[label])
        .map_err(|e| ApiError::internal_error(format!("Failed to create {}: {}", name, e)))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| ApiError::internal_error(format!("Failed to register {}: {}", name, e)))?;
    Ok(gauge)
}

fn set(gauge: &IntGaugeVec, label: &str, value: u64) {
    gauge
        .with_label_values(&[label])
        .set(i64::try_from(value).unwrap_or(i64::MAX));
}

impl ServiceMetrics {
    /// Create and register all gauges on a fresh registry.
    pub fn new(
        refiller: CacheRefiller,
        ingest: Arc<IngestMetrics>,
        cache: Arc<dyn CacheStore>,
    ) -> ApiResult<Self> {
        let registry = Registry::new();

        let refill_events = labelled(
            &registry,
            "goods_cache_refill_events",
            "Snapshot refill requests by outcome",
            "outcome",
        )?;
        let ingest_events = labelled(
            &registry,
            "goods_audit_ingest_events",
            "Audit ingestion messages, batches and rows",
            "kind",
        )?;
        let cache_events = labelled(
            &registry,
            "goods_snapshot_cache_events",
            "Snapshot cache hits, misses, writes and invalidations",
            "kind",
        )?;

        let cache_snapshot_bytes = IntGauge::new(
            "goods_snapshot_cache_bytes",
            "Size of the live snapshot in bytes",
        )
        .map_err(|e| ApiError::internal_error(format!("Failed to create snapshot bytes: {}", e)))?;
        registry
            .register(Box::new(cache_snapshot_bytes.clone()))
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register snapshot bytes: {}", e))
            })?;

        Ok(Self {
            registry,
            refill_events,
            ingest_events,
            cache_events,
            cache_snapshot_bytes,
            refiller,
            ingest,
            cache,
        })
    }

    /// Refresh every gauge from its source and encode the registry.
    pub async fn render(&self) -> ApiResult<Vec<u8>> {
        let refill = self.refiller.metrics();
        set(&self.refill_events, "requested", refill.requested);
        set(&self.refill_events, "dropped", refill.dropped);
        set(&self.refill_events, "refilled", refill.refills);
        set(&self.refill_events, "failed", refill.failures);

        let ingest = self.ingest.snapshot();
        set(&self.ingest_events, "messages", ingest.messages);
        set(&self.ingest_events, "flushes", ingest.flushes);
        set(&self.ingest_events, "flush_failures", ingest.flush_failures);
        set(&self.ingest_events, "rows_flushed", ingest.rows_flushed);
        set(&self.ingest_events, "decode_failures", ingest.decode_failures);

        match self.cache.stats().await {
            Ok(stats) => {
                set(&self.cache_events, "hits", stats.hits);
                set(&self.cache_events, "misses", stats.misses);
                set(&self.cache_events, "writes", stats.writes);
                set(&self.cache_events, "invalidations", stats.invalidations);
                self.cache_snapshot_bytes
                    .set(i64::try_from(stats.snapshot_bytes).unwrap_or(i64::MAX));
            }
            Err(e) => tracing::warn!(error = %e, "Cache stats unavailable, keeping last values"),
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ApiError::internal_error(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}

/// GET /metrics - Prometheus text format
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics", body = ApiError),
    ),
))]
pub async fn metrics_handler(State(metrics): State<Arc<ServiceMetrics>>) -> Response {
    match metrics.render().await {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            e.into_response()
        }
    }
}
