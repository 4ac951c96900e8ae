//! Output channel trait and in-process implementations.

use crate::core::ToolEvent;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, Level};

/// Receiver of outward tool events.
///
/// Emission is fire-and-forget: implementations must not block and must not
/// fail the caller.
#[cfg_attr(test, mockall::automock)]
pub trait OutputChannel: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: ToolEvent);
}

/// A channel that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpChannel;

impl OutputChannel for NoOpChannel {
    fn emit(&self, _event: ToolEvent) {}
}

/// A channel that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingChannel {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingChannel {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingChannel {
    /// Creates a new logging channel with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging channel.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl OutputChannel for LoggingChannel {
    fn emit(&self, event: ToolEvent) {
        let event_type = event.event_type();
        let call_id = event.call_id().unwrap_or("-");
        let data = event.to_json();

        if self.level == Level::DEBUG {
            debug!(event_type = %event_type, call_id = %call_id, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, call_id = %call_id, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// A channel that records every event, for tests and embedding.
#[derive(Debug, Default)]
pub struct CollectingChannel {
    events: RwLock<Vec<ToolEvent>>,
    notify: Notify,
}

impl CollectingChannel {
    /// Creates a new collecting channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ToolEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose dotted type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<ToolEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the events for one call id, in arrival order.
    #[must_use]
    pub fn events_for_call(&self, call_id: &str) -> Vec<ToolEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.call_id() == Some(call_id))
            .cloned()
            .collect()
    }

    /// Waits until `predicate` holds over the collected events.
    ///
    /// Returns false if `timeout` elapses first.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> bool
    where
        F: Fn(&[ToolEvent]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if predicate(&self.events.read()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return predicate(&self.events.read());
            }
        }
    }
}

impl OutputChannel for CollectingChannel {
    fn emit(&self, event: ToolEvent) {
        self.events.write().push(event);
        self.notify.notify_waiters();
    }
}
