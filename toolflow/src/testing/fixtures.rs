//! Test harness wiring an orchestrator to a collecting channel.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::cancellation::CancellationToken;
use crate::core::{BatchId, ToolCall, ToolCallRequest};
use crate::errors::OrchestrationError;
use crate::events::CollectingChannel;
use crate::orchestrator::ToolCallOrchestrator;
use crate::tools::{ApprovalPolicy, Tool, ToolRegistry};

/// An orchestrator with a registry, a collecting channel and recorded
/// completions.
///
/// Must be created inside a tokio runtime.
pub struct TestHarness {
    /// The tool registry.
    pub registry: Arc<ToolRegistry>,
    /// The orchestrator under test.
    pub orchestrator: ToolCallOrchestrator,
    /// Receives every routed event.
    pub channel: Arc<CollectingChannel>,
    /// The batch signal passed to `schedule`.
    pub signal: Arc<CancellationToken>,
    completions: Arc<Mutex<Vec<Vec<ToolCall>>>>,
    completed: Arc<Notify>,
}

impl TestHarness {
    /// Creates a harness with the given policy and tools.
    #[must_use]
    pub fn new(policy: ApprovalPolicy, tools: Vec<Arc<dyn Tool>>) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(tool);
        }

        let orchestrator = ToolCallOrchestrator::with_registry(registry.clone(), policy);
        let completions = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(Notify::new());
        {
            let completions = completions.clone();
            let completed = completed.clone();
            orchestrator.on_batch_complete(move |calls| {
                completions.lock().push(calls.to_vec());
                completed.notify_waiters();
            });
        }

        Self {
            registry,
            orchestrator,
            channel: Arc::new(CollectingChannel::new()),
            signal: CancellationToken::shared(),
            completions,
            completed,
        }
    }

    /// Schedules `requests` on the harness channel and signal.
    pub fn schedule(&self, requests: Vec<ToolCallRequest>) -> Result<BatchId, OrchestrationError> {
        self.orchestrator
            .schedule_batch(requests, &self.signal, self.channel.clone())
    }

    /// Returns every completed batch so far.
    #[must_use]
    pub fn completions(&self) -> Vec<Vec<ToolCall>> {
        self.completions.lock().clone()
    }

    /// Waits for the `n`-th completion (1-based) and returns its calls.
    pub async fn wait_for_completion(&self, n: usize, timeout: Duration) -> Option<Vec<ToolCall>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(calls) = self.completions.lock().get(n.saturating_sub(1)) {
                return Some(calls.clone());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.completions.lock().get(n.saturating_sub(1)).cloned();
            }
        }
    }

    /// Waits until a confirmation request for `call_id` has been emitted.
    pub async fn wait_for_confirmation(&self, call_id: &str, timeout: Duration) -> bool {
        self.channel
            .wait_for(
                |events| {
                    events.iter().any(|e| {
                        e.event_type() == "tool.confirmation_request" && e.call_id() == Some(call_id)
                    })
                },
                timeout,
            )
            .await
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("registry", &self.registry)
            .field("orchestrator", &self.orchestrator)
            .field("events", &self.channel.len())
            .finish_non_exhaustive()
    }
}
