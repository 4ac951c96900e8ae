//! The tool call orchestrator.
//!
//! [`ToolCallOrchestrator`] sits above the [`ToolCallScheduler`]. It forwards
//! batches and confirmation responses to the scheduler and turns the
//! scheduler's updates into outward [`ToolEvent`](crate::core::ToolEvent)s on
//! the current [`OutputChannel`].
//!
//! Per call the outward order is `started`, zero or more `progress`, then one
//! `result` once the whole batch has settled, followed by `batch-complete`.

mod integration_tests;
mod router;

pub use router::CompletionCallback;

use crate::cancellation::CancellationToken;
use crate::config::ToolflowConfig;
use crate::core::{BatchId, ConfirmationOutcome, ToolCall, ToolCallRequest};
use crate::errors::OrchestrationError;
use crate::events::OutputChannel;
use crate::scheduler::{ToolCallScheduler, USER_CANCEL_REASON};
use crate::tools::{ApprovalPolicy, ToolRegistry};
use router::EventRouter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Entry point for scheduling tool batches and answering confirmations.
pub struct ToolCallOrchestrator {
    scheduler: ToolCallScheduler,
    router: Arc<EventRouter>,
    pump: JoinHandle<()>,
    cancel_reason: String,
}

impl ToolCallOrchestrator {
    /// Creates an orchestrator without a tool registry.
    ///
    /// Spawns the update pump, so it must be called from within a tokio
    /// runtime.
    #[must_use]
    pub fn new(policy: ApprovalPolicy) -> Self {
        let (scheduler, mut updates) = ToolCallScheduler::new(Arc::new(policy));
        let router = Arc::new(EventRouter::default());

        let pump = {
            let router = router.clone();
            tokio::spawn(async move {
                while let Some(update) = updates.recv().await {
                    router.handle_update(update);
                }
                debug!("Scheduler update stream closed");
            })
        };

        Self {
            scheduler,
            router,
            pump,
            cancel_reason: USER_CANCEL_REASON.to_string(),
        }
    }

    /// Creates an orchestrator with a registry installed.
    #[must_use]
    pub fn with_registry(registry: Arc<ToolRegistry>, policy: ApprovalPolicy) -> Self {
        let orchestrator = Self::new(policy);
        orchestrator.initialize(registry);
        orchestrator
    }

    /// Creates an orchestrator from configuration.
    #[must_use]
    pub fn from_config(config: &ToolflowConfig, registry: Arc<ToolRegistry>) -> Self {
        Self::with_registry(registry, config.build_policy())
            .with_cancel_reason(config.cancel_reason.clone())
    }

    /// Sets the reason recorded by [`cancel_all`](Self::cancel_all).
    #[must_use]
    pub fn with_cancel_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancel_reason = reason.into();
        self
    }

    /// Installs or replaces the tool registry.
    pub fn initialize(&self, registry: Arc<ToolRegistry>) {
        self.scheduler.initialize(registry);
    }

    /// Returns the underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &ToolCallScheduler {
        &self.scheduler
    }

    /// Returns the approval policy.
    #[must_use]
    pub fn policy(&self) -> &Arc<ApprovalPolicy> {
        self.scheduler.policy()
    }

    /// Schedules a batch and makes `channel` the current output channel.
    ///
    /// One `started` event is emitted per request before any other event of
    /// the batch. Structural failures leave no channel bound.
    pub fn schedule_batch(
        &self,
        requests: Vec<ToolCallRequest>,
        signal: &Arc<CancellationToken>,
        channel: Arc<dyn OutputChannel>,
    ) -> Result<BatchId, OrchestrationError> {
        self.scheduler.check_schedulable(&requests)?;

        let announced = requests.clone();
        let batch_id = self
            .router
            .bind(channel, &announced, || self.scheduler.schedule(requests, signal))?;
        info!(batch_id = %batch_id, calls = announced.len(), "Tool batch scheduled");
        Ok(batch_id)
    }

    /// Answers a pending confirmation.
    pub fn confirm_tool_call(
        &self,
        call_id: &str,
        outcome: ConfirmationOutcome,
        signal: Option<Arc<CancellationToken>>,
    ) -> Result<(), OrchestrationError> {
        self.scheduler
            .handle_confirmation_response(call_id, outcome, signal)
    }

    /// Answers a pending confirmation from a raw outcome string.
    ///
    /// Fails with `InvalidArgument` unless `outcome` names one of the four
    /// outcomes.
    pub fn confirm_tool_call_raw(
        &self,
        call_id: &str,
        outcome: &str,
        signal: Option<Arc<CancellationToken>>,
    ) -> Result<(), OrchestrationError> {
        let outcome: ConfirmationOutcome = outcome.parse()?;
        self.confirm_tool_call(call_id, outcome, signal)
    }

    /// Replaces the arguments of a call awaiting approval.
    pub fn modify_tool_call_args(
        &self,
        call_id: &str,
        args: serde_json::Value,
    ) -> Result<(), OrchestrationError> {
        self.scheduler.update_pending_args(call_id, args)
    }

    /// Cancels every live call in the active batch.
    ///
    /// The bound channel still receives the cancellations and final results,
    /// then is released once the completion is routed. With no active batch
    /// the channel is released immediately.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.scheduler.cancel_all(&self.cancel_reason);
        if cancelled == 0 {
            self.router.release();
        }
        info!(cancelled, "Cancelled all tool calls");
        cancelled
    }

    /// Drops the current output channel and clears de-duplication state.
    pub fn release_channel(&self) {
        self.router.release();
    }

    /// Returns true while an output channel is current.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.router.has_channel()
    }

    /// Registers the callback invoked with every completed batch.
    pub fn on_batch_complete<F>(&self, callback: F)
    where
        F: Fn(&[ToolCall]) + Send + Sync + 'static,
    {
        self.router.set_on_complete(Arc::new(callback));
    }

    /// Returns the active batch id, if any.
    #[must_use]
    pub fn active_batch_id(&self) -> Option<BatchId> {
        self.scheduler.active_batch_id()
    }

    /// Returns snapshots of non-terminal calls.
    #[must_use]
    pub fn live_calls(&self) -> Vec<ToolCall> {
        self.scheduler.live_calls()
    }

    /// Returns a snapshot of one call in the active batch.
    #[must_use]
    pub fn get_call(&self, call_id: &str) -> Option<ToolCall> {
        self.scheduler.get_call(call_id)
    }

    /// Returns snapshots of calls awaiting approval.
    #[must_use]
    pub fn pending_confirmations(&self) -> Vec<ToolCall> {
        self.scheduler.pending_confirmations()
    }
}

impl Drop for ToolCallOrchestrator {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

impl std::fmt::Debug for ToolCallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallOrchestrator")
            .field("scheduler", &self.scheduler)
            .field("bound_batch", &self.router.bound_batch())
            .field("cancel_reason", &self.cancel_reason)
            .finish_non_exhaustive()
    }
}
