//! In-process message bus.
//!
//! Fans every payload published on the `goods.changes` subject out to one
//! bounded mpsc queue per subscriber. Every subscriber sees every payload
//! published after it subscribed, in publish order.
//!
//! Delivery never overwrites: when a subscriber's queue is full, `publish`
//! waits for it to drain. Subscribers that have gone away are pruned on the
//! next publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use goods_core::{GoodsResult, StorageError, CHANGES_SUBJECT};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::traits::{BusSubscription, MessageBus};

fn publish_error(reason: impl Into<String>) -> StorageError {
    StorageError::Publish {
        reason: reason.into(),
    }
}

/// Lossless fan-out [`MessageBus`].
pub struct FanoutBus {
    capacity: usize,
    subscribers: Mutex<Vec<mpsc::Sender<Vec<u8>>>>,
    failing: AtomicBool,
}

impl FanoutBus {
    /// Create a bus queueing up to `capacity` payloads per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent publish fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|subscribers| subscribers.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop closed subscribers and return the live ones.
    fn live_subscribers(&self) -> GoodsResult<Vec<mpsc::Sender<Vec<u8>>>> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| publish_error("subscriber list poisoned"))?;
        subscribers.retain(|tx| !tx.is_closed());
        Ok(subscribers.clone())
    }
}

#[async_trait]
impl MessageBus for FanoutBus {
    async fn publish(&self, payload: Vec<u8>) -> GoodsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(publish_error(format!("{} unavailable", CHANGES_SUBJECT)).into());
        }

        let bytes = payload.len();
        let mut receivers = 0usize;
        for tx in self.live_subscribers()? {
            // Waits while this subscriber's queue is full.
            if tx.send(payload.clone()).await.is_ok() {
                receivers += 1;
            }
        }

        if receivers == 0 {
            return Err(publish_error(format!("no subscribers on {}", CHANGES_SUBJECT)).into());
        }

        debug!(
            subject = CHANGES_SUBJECT,
            bytes = bytes,
            receivers = receivers,
            "Published change event"
        );
        Ok(())
    }

    fn subscribe(&self) -> GoodsResult<BusSubscription> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .map_err(|_| publish_error("subscriber list poisoned"))?
            .push(tx);
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
