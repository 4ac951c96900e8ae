//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// Identifies a registered cancellation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// A broadcastable token for cooperative cancellation.
///
/// One token is shared per batch: the scheduler listens for it through
/// [`on_cancel`](Self::on_cancel), tools observe it through
/// [`is_cancelled`](Self::is_cancelled) or [`cancelled`](Self::cancelled).
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Pending callbacks. The flag only flips while this lock is held.
    callbacks: Mutex<Vec<(CallbackId, CancelCallback)>>,
    next_id: AtomicU64,
    /// Wakes tasks parked in `cancelled()`.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new token behind an `Arc`, ready to share.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Callbacks are invoked immediately, before async waiters wake.
    /// Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        let callbacks = {
            let mut callbacks = self.callbacks.lock();
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            *self.reason.write() = Some(reason.into());
            self.cancelled.store(true, Ordering::SeqCst);
            std::mem::take(&mut *callbacks)
        };

        for (_, callback) in &callbacks {
            run_callback(callback.as_ref());
        }
        self.notify.notify_waiters();
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately. The returned
    /// id can be passed to [`remove_callback`](Self::remove_callback).
    pub fn on_cancel<F>(&self, callback: F) -> CallbackId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut callbacks = self.callbacks.lock();
            if !self.cancelled.load(Ordering::SeqCst) {
                callbacks.push((id, Box::new(callback)));
                return id;
            }
        }
        run_callback(&callback);
        id
    }

    /// Drops a callback that has not run yet. Returns true if it was pending.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != id);
        callbacks.len() != before
    }

    /// Returns the number of callbacks still waiting for cancellation.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

fn run_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

/// A token raised as soon as any of its parents is raised.
///
/// The child takes the reason of the first parent raised. Links are removed
/// from the parents when this value drops.
pub struct LinkedToken {
    token: Arc<CancellationToken>,
    links: Vec<(Arc<CancellationToken>, CallbackId)>,
}

impl LinkedToken {
    /// Links a fresh token to every token in `parents`.
    #[must_use]
    pub fn new(parents: &[Arc<CancellationToken>]) -> Self {
        let token = CancellationToken::shared();
        let links = parents
            .iter()
            .map(|parent| {
                let child = Arc::downgrade(&token);
                let source: Weak<CancellationToken> = Arc::downgrade(parent);
                let id = parent.on_cancel(move || {
                    let Some(child) = child.upgrade() else {
                        return;
                    };
                    let reason = source
                        .upgrade()
                        .and_then(|source| source.reason())
                        .unwrap_or_else(|| "cancelled".to_string());
                    child.cancel(reason);
                });
                (Arc::clone(parent), id)
            })
            .collect();
        Self { token, links }
    }

    /// Returns the linked token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }
}

impl Drop for LinkedToken {
    fn drop(&mut self) {
        for (parent, id) in &self.links {
            parent.remove_callback(*id);
        }
    }
}

impl std::fmt::Debug for LinkedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedToken")
            .field("token", &self.token)
            .field("parents", &self.links.len())
            .finish()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
