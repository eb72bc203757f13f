//! Audit Ingestion Background Task
//!
//! Drains change events from the message bus into the append-only audit
//! log. Events are expanded into `LogEntry` rows and buffered; the buffer is
//! written to the analytics store in one transactional batch.
//!
//! The buffer is owned by a single task. Bus payloads reach it over an mpsc
//! channel, so there is exactly one writer and no locking.
//!
//! # Flush boundary
//!
//! With batch size `N`:
//!
//! - [`FlushPolicy::BeforeAppend`] (default): when an arriving message would
//!   bring the buffer to `N` or more, the rows already buffered are flushed
//!   first and the new rows are buffered afterwards. `N` single-row events
//!   produce one flush of `N - 1` rows.
//! - [`FlushPolicy::OnCapacity`]: rows are appended first and the buffer is
//!   flushed as soon as it holds `N` or more.
//!
//! A flush writes the buffer in batches of at most `N` rows, so an event
//! that expands to more than `N` rows spans several batches. A failed batch
//! keeps its rows and everything after it buffered; they are retried on the
//! next message. Rows are delivered at least once; a batch whose commit
//! outcome was lost may be written twice.
//!
//! # Shutdown
//!
//! The forwarder stops taking new payloads when shutdown is signalled, hands
//! over everything the subscription already holds, and closes the channel.
//! The consumer runs until that channel closes, so every change published
//! before shutdown reaches the final flush.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use goods_core::{ChangeEvent, GoodsResult, LogEntry, DEFAULT_LOG_BATCH_SIZE};
use goods_storage::{AnalyticsStore, BusSubscription, MessageBus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::constants::INGEST_CHANNEL_CAPACITY;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// When the ingestion buffer is flushed relative to the arriving message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    #[default]
    BeforeAppend,
    OnCapacity,
}

impl FromStr for FlushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before_append" => Ok(FlushPolicy::BeforeAppend),
            "on_capacity" => Ok(FlushPolicy::OnCapacity),
            other => Err(format!("unknown flush policy '{}'", other)),
        }
    }
}

/// Configuration for the audit ingestion task.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Rows per analytics batch (default: 25)
    pub batch_size: usize,

    pub flush_policy: FlushPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_LOG_BATCH_SIZE,
            flush_policy: FlushPolicy::default(),
        }
    }
}

impl IngestConfig {
    pub fn new(batch_size: usize, flush_policy: FlushPolicy) -> Self {
        Self {
            batch_size: if batch_size == 0 {
                DEFAULT_LOG_BATCH_SIZE
            } else {
                batch_size
            },
            flush_policy,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for ingestion activity.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    /// Payloads received from the bus
    pub messages: AtomicU64,

    /// Successful analytics batches
    pub flushes: AtomicU64,

    /// Failed analytics batches (rows retained)
    pub flush_failures: AtomicU64,

    /// Rows committed to the analytics store
    pub rows_flushed: AtomicU64,

    /// Payloads that were not a valid change event
    pub decode_failures: AtomicU64,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            rows_flushed: self.rows_flushed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of ingestion metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub messages: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub rows_flushed: u64,
    pub decode_failures: u64,
}

// ============================================================================
// CONSUMER
// ============================================================================

/// Buffering consumer that owns the pending audit rows.
pub struct BatchConsumer {
    analytics: Arc<dyn AnalyticsStore>,
    config: IngestConfig,
    buffer: Vec<LogEntry>,
    metrics: Arc<IngestMetrics>,
}

impl BatchConsumer {
    pub fn new(analytics: Arc<dyn AnalyticsStore>, config: IngestConfig) -> Self {
        Self {
            analytics,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IngestMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Rows waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Process one bus payload.
    pub async fn handle(&mut self, payload: &[u8]) {
        self.metrics.messages.fetch_add(1, Ordering::Relaxed);

        let rows = match ChangeEvent::decode(payload) {
            Ok(event) => event.into_log_entries(),
            Err(e) => {
                self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    bytes = payload.len(),
                    "Skipping undecodable change event"
                );
                return;
            }
        };

        let batch_size = self.config.batch_size;
        match self.config.flush_policy {
            FlushPolicy::BeforeAppend => {
                if !self.buffer.is_empty() && self.buffer.len() + rows.len() >= batch_size {
                    let _ = self.flush().await;
                }
                self.buffer.extend(rows);
            }
            FlushPolicy::OnCapacity => {
                self.buffer.extend(rows);
                if self.buffer.len() >= batch_size {
                    let _ = self.flush().await;
                }
            }
        }
    }

    /// Write the buffer in batches of at most `batch_size` rows. Rows from
    /// the first failed batch onward stay buffered.
    pub async fn flush(&mut self) -> GoodsResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut written = 0usize;
        let mut failure = None;
        for batch in self.buffer.chunks(self.config.batch_size) {
            match self.analytics.append_batch(batch).await {
                Ok(()) => {
                    written += batch.len();
                    self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .rows_flushed
                        .fetch_add(batch.len() as u64, Ordering::Relaxed);
                    tracing::debug!(rows = batch.len(), "Flushed audit batch");
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.buffer.drain(..written);

        match failure {
            None => Ok(()),
            Some(e) => {
                self.metrics.flush_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %e,
                    buffered = self.buffer.len(),
                    "Audit batch flush failed, retaining rows"
                );
                Err(e)
            }
        }
    }

    /// Consume payloads until every sender has gone, then flush once.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Vec<u8>>) -> Arc<IngestMetrics> {
        tracing::info!(
            batch_size = self.config.batch_size,
            flush_policy = ?self.config.flush_policy,
            "Audit ingestion task started"
        );

        while let Some(payload) = rx.recv().await {
            self.handle(&payload).await;
        }
        tracing::info!("Audit ingestion task shutting down");

        if !self.buffer.is_empty() && self.flush().await.is_err() {
            tracing::error!(
                lost = self.buffer.len(),
                "Final audit flush failed, rows dropped at shutdown"
            );
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            messages = snapshot.messages,
            flushes = snapshot.flushes,
            flush_failures = snapshot.flush_failures,
            rows_flushed = snapshot.rows_flushed,
            decode_failures = snapshot.decode_failures,
            "Audit ingestion task completed"
        );

        self.metrics
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// Handles for a running ingestion pipeline.
pub struct IngestHandle {
    pub metrics: Arc<IngestMetrics>,
    pub consumer: JoinHandle<Arc<IngestMetrics>>,
    pub forwarder: JoinHandle<()>,
}

/// Subscribe to the bus and spawn the forwarder and consumer tasks.
///
/// Only the forwarder watches `shutdown_rx`; the consumer stops once the
/// forwarder has handed over its last payload.
pub fn spawn_audit_ingest(
    bus: &dyn MessageBus,
    analytics: Arc<dyn AnalyticsStore>,
    config: IngestConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> GoodsResult<IngestHandle> {
    let subscription = bus.subscribe()?;
    let (tx, rx) = mpsc::channel::<Vec<u8>>(INGEST_CHANNEL_CAPACITY);

    let consumer = BatchConsumer::new(analytics, config);
    let metrics = consumer.metrics();
    let consumer = tokio::spawn(consumer.run(rx));
    let forwarder = tokio::spawn(forward(subscription, tx, shutdown_rx));

    Ok(IngestHandle {
        metrics,
        consumer,
        forwarder,
    })
}

/// Move payloads from the bus to the consumer until shutdown, then hand over
/// whatever the subscription already holds. Dropping `tx` on return closes
/// the consumer's channel.
async fn forward(
    mut subscription: BusSubscription,
    tx: mpsc::Sender<Vec<u8>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            payload = subscription.next() => {
                let Some(payload) = payload else {
                    tracing::debug!("Bus subscription closed");
                    return;
                };
                if tx.send(payload).await.is_err() {
                    tracing::error!("Audit ingestion task is gone, stopping forwarder");
                    return;
                }
            }
        }
    }

    let mut drained = 0u64;
    while let Some(Some(payload)) = subscription.next().now_or_never() {
        if tx.send(payload).await.is_err() {
            tracing::error!("Audit ingestion task is gone, pending payloads dropped");
            return;
        }
        drained += 1;
    }
    tracing::debug!(drained = drained, "Bus forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use goods_core::{Good, PriorityChange};
    use goods_storage::{FanoutBus, InMemoryAnalyticsStore};

    fn payload(id: i64) -> Vec<u8> {
        ChangeEvent::Created {
            good: Good {
                id,
                project_id: 1,
                name: format!("g{}", id),
                description: None,
                priority: id,
                removed: false,
                created_at: Utc::now(),
            },
        }
        .encode()
        .expect("encode should succeed")
    }

    fn consumer(
        batch_size: usize,
        policy: FlushPolicy,
    ) -> (BatchConsumer, Arc<InMemoryAnalyticsStore>) {
        let analytics = Arc::new(InMemoryAnalyticsStore::new());
        let consumer = BatchConsumer::new(analytics.clone(), IngestConfig::new(batch_size, policy));
        (consumer, analytics)
    }

    #[test]
    fn test_flush_policy_parse() {
        assert_eq!("before_append".parse::<FlushPolicy>(), Ok(FlushPolicy::BeforeAppend));
        assert_eq!(" On_Capacity ".parse::<FlushPolicy>(), Ok(FlushPolicy::OnCapacity));
        assert!("eventually".parse::<FlushPolicy>().is_err());
    }

    #[test]
    fn test_zero_batch_size_uses_default() {
        assert_eq!(IngestConfig::new(0, FlushPolicy::default()).batch_size, 25);
    }

    #[tokio::test]
    async fn test_before_append_flushes_n_minus_one() {
        let (mut consumer, analytics) = consumer(25, FlushPolicy::BeforeAppend);
        for id in 1..=25 {
            consumer.handle(&payload(id)).await;
        }

        let batches = analytics.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 24);
        assert_eq!(consumer.buffered(), 1);
    }

    #[tokio::test]
    async fn test_fewer_than_n_never_flushes() {
        let (mut consumer, analytics) = consumer(25, FlushPolicy::BeforeAppend);
        for id in 1..25 {
            consumer.handle(&payload(id)).await;
        }
        assert_eq!(analytics.flush_count(), 0);
        assert_eq!(consumer.buffered(), 24);
    }

    #[tokio::test]
    async fn test_on_capacity_flushes_full_batches() {
        let (mut consumer, analytics) = consumer(5, FlushPolicy::OnCapacity);
        for id in 1..=10 {
            consumer.handle(&payload(id)).await;
        }
        let sizes: Vec<usize> = analytics.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5]);
        assert_eq!(consumer.buffered(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_retains_and_retries() {
        let (mut consumer, analytics) = consumer(3, FlushPolicy::BeforeAppend);
        analytics.set_failing(true);
        for id in 1..=3 {
            consumer.handle(&payload(id)).await;
        }
        assert_eq!(analytics.flush_count(), 0);
        assert_eq!(consumer.buffered(), 3);

        analytics.set_failing(false);
        consumer.handle(&payload(4)).await;

        let batches = analytics.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(consumer.buffered(), 1);

        let m = consumer.metrics().snapshot();
        assert_eq!(m.flush_failures, 1);
        assert_eq!(m.flushes, 1);
    }

    #[tokio::test]
    async fn test_multi_row_event_and_garbage() {
        let (mut consumer, analytics) = consumer(3, FlushPolicy::BeforeAppend);
        consumer.handle(b"not an event").await;
        consumer.handle(&payload(1)).await;

        let reprioritized = ChangeEvent::Reprioritized {
            changes: vec![
                PriorityChange { id: 1, priority: 5 },
                PriorityChange { id: 2, priority: 6 },
            ],
        }
        .encode()
        .expect("encode should succeed");
        consumer.handle(&reprioritized).await;

        // 1 buffered + 2 arriving reaches 3, so the single row goes first.
        assert_eq!(analytics.batches()[0].len(), 1);
        assert_eq!(consumer.buffered(), 2);
        assert_eq!(consumer.metrics().snapshot().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_oversized_event_spans_several_batches() {
        let (mut consumer, analytics) = consumer(3, FlushPolicy::OnCapacity);
        let reprioritized = ChangeEvent::Reprioritized {
            changes: (1..=7)
                .map(|id| PriorityChange { id, priority: id + 10 })
                .collect(),
        }
        .encode()
        .expect("encode should succeed");
        consumer.handle(&reprioritized).await;

        let sizes: Vec<usize> = analytics.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(consumer.buffered(), 0);
        assert_eq!(consumer.metrics().snapshot().flushes, 3);
    }

    #[tokio::test]
    async fn test_before_append_keeps_batches_within_size() {
        let (mut consumer, analytics) = consumer(3, FlushPolicy::BeforeAppend);
        let reprioritized = ChangeEvent::Reprioritized {
            changes: (1..=5)
                .map(|id| PriorityChange { id, priority: id })
                .collect(),
        }
        .encode()
        .expect("encode should succeed");

        consumer.handle(&reprioritized).await;
        assert_eq!(analytics.flush_count(), 0);
        consumer.handle(&payload(6)).await;

        let sizes: Vec<usize> = analytics.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 2]);
        assert_eq!(consumer.buffered(), 1);
    }

    #[tokio::test]
    async fn test_run_flushes_remainder_when_channel_closes() {
        let (consumer, analytics) = consumer(25, FlushPolicy::BeforeAppend);
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(consumer.run(rx));
        for id in 1..=3 {
            tx.send(payload(id)).await.expect("consumer is running");
        }
        drop(tx);

        let metrics = handle.await.expect("task should not panic");
        assert_eq!(metrics.snapshot().rows_flushed, 3);
        assert_eq!(analytics.rows().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_hands_over_queued_payloads() -> GoodsResult<()> {
        let bus = FanoutBus::new(64);
        let analytics = Arc::new(InMemoryAnalyticsStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_audit_ingest(
            &bus,
            analytics.clone(),
            IngestConfig::new(25, FlushPolicy::BeforeAppend),
            shutdown_rx,
        )?;
        for id in 1..=10 {
            bus.publish(payload(id)).await?;
        }
        shutdown_tx.send(true).expect("forwarder is listening");

        handle.forwarder.await.expect("forwarder should not panic");
        let metrics = handle.consumer.await.expect("consumer should not panic");
        assert_eq!(metrics.snapshot().rows_flushed, 10);
        assert_eq!(analytics.rows().len(), 10);
        Ok(())
    }
}
