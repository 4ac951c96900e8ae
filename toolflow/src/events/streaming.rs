//! Bounded streaming output channel with backpressure metrics.

use super::OutputChannel;
use crate::core::ToolEvent;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

/// Callback invoked with each dropped event.
pub type DropCallback = Arc<dyn Fn(&ToolEvent) + Send + Sync>;

/// Metrics for backpressure monitoring.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Number of events successfully queued.
    emitted: AtomicU64,
    /// Number of events dropped.
    dropped: AtomicU64,
    /// Last time an event was dropped.
    last_drop_time: RwLock<Option<Instant>>,
}

impl StreamMetrics {
    /// Records a queued event.
    pub fn record_emit(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped event.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        *self.last_drop_time.write() = Some(Instant::now());
    }

    /// Returns the number of queued events.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped events.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns when the last drop happened.
    #[must_use]
    pub fn last_drop_time(&self) -> Option<Instant> {
        *self.last_drop_time.read()
    }

    /// Returns the drop rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn drop_rate(&self) -> f64 {
        let emitted = self.emitted();
        let dropped = self.dropped();
        let total = emitted + dropped;
        if total == 0 {
            0.0
        } else {
            (dropped as f64 / total as f64) * 100.0
        }
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "emitted": self.emitted(),
            "dropped": self.dropped(),
            "drop_rate_percent": (self.drop_rate() * 100.0).round() / 100.0
        })
    }
}

/// Forwards events into a bounded queue read by a transport.
///
/// Emission never blocks: when the queue is full or the receiver is gone the
/// event is dropped, counted and handed to the drop callback.
pub struct StreamingChannel {
    tx: mpsc::Sender<ToolEvent>,
    capacity: usize,
    metrics: Arc<StreamMetrics>,
    on_drop: RwLock<Option<DropCallback>>,
}

impl StreamingChannel {
    /// Creates a channel and the receiver the transport drains.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ToolEvent>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let channel = Self {
            tx,
            capacity,
            metrics: Arc::new(StreamMetrics::default()),
            on_drop: RwLock::new(None),
        };
        (channel, rx)
    }

    /// Sets the drop callback.
    pub fn set_on_drop<F>(&self, callback: F)
    where
        F: Fn(&ToolEvent) + Send + Sync + 'static,
    {
        *self.on_drop.write() = Some(Arc::new(callback));
    }

    /// Returns the queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the backpressure metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        self.metrics.clone()
    }
}

impl OutputChannel for StreamingChannel {
    fn emit(&self, event: ToolEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.metrics.record_emit(),
            Err(mpsc::error::TrySendError::Full(event) | mpsc::error::TrySendError::Closed(event)) => {
                self.metrics.record_drop();
                warn!(
                    event_type = %event.event_type(),
                    call_id = event.call_id().unwrap_or("-"),
                    dropped = self.metrics.dropped(),
                    "Stream queue unavailable, dropping event"
                );

                let callback = self.on_drop.read().clone();
                if let Some(callback) = callback {
                    callback(&event);
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingChannel")
            .field("capacity", &self.capacity)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
