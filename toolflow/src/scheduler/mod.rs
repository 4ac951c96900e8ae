//! The tool call scheduler.
//!
//! [`ToolCallScheduler`] owns the canonical state of every call in the active
//! batch. It validates each call against the registry, consults the
//! [`ApprovalPolicy`], runs approved calls on tokio tasks and publishes a
//! [`SchedulerUpdate`] for every change.
//!
//! All mutation is serialized through one lock. Updates are sent while the
//! lock is held, so receivers observe them in mutation order.

mod batch;
mod execution;
mod update;

pub use update::SchedulerUpdate;

use crate::cancellation::{CallbackId, CancellationToken};
use crate::core::{
    BatchId, ConfirmationDetails, ConfirmationOutcome, ToolCall, ToolCallRequest, ToolCallResult,
    ToolCallStatus,
};
use crate::errors::{OrchestrationError, ToolError};
use crate::observability::{SpanTimer, WideEventEmitter};
use crate::tools::{ApprovalPolicy, Tool, ToolRegistry};
use batch::Batch;
use execution::ExecutionJob;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Reason recorded when a pending call is rejected with `cancel`.
pub const USER_CANCEL_REASON: &str = "cancelled by user";

/// Schedules, gates and runs tool calls one batch at a time.
#[derive(Clone)]
pub struct ToolCallScheduler {
    inner: Arc<SchedulerInner>,
}

pub(crate) struct SchedulerInner {
    registry: RwLock<Option<Arc<ToolRegistry>>>,
    policy: Arc<ApprovalPolicy>,
    state: Mutex<Option<Batch>>,
    updates: mpsc::UnboundedSender<SchedulerUpdate>,
    wide_events: WideEventEmitter,
}

impl ToolCallScheduler {
    /// Creates an uninitialized scheduler and the receiver for its updates.
    #[must_use]
    pub fn new(policy: Arc<ApprovalPolicy>) -> (Self, mpsc::UnboundedReceiver<SchedulerUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                registry: RwLock::new(None),
                policy,
                state: Mutex::new(None),
                updates: tx,
                wide_events: WideEventEmitter::new(),
            }),
        };
        (scheduler, rx)
    }

    /// Creates a scheduler with a registry already installed.
    #[must_use]
    pub fn with_registry(
        registry: Arc<ToolRegistry>,
        policy: Arc<ApprovalPolicy>,
    ) -> (Self, mpsc::UnboundedReceiver<SchedulerUpdate>) {
        let (scheduler, rx) = Self::new(policy);
        scheduler.initialize(registry);
        (scheduler, rx)
    }

    /// Installs or replaces the tool registry.
    pub fn initialize(&self, registry: Arc<ToolRegistry>) {
        *self.inner.registry.write() = Some(registry);
    }

    /// Returns true once a registry is installed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.registry.read().is_some()
    }

    /// Returns the approval policy.
    #[must_use]
    pub fn policy(&self) -> &Arc<ApprovalPolicy> {
        &self.inner.policy
    }

    /// Checks that `requests` could be scheduled right now.
    pub fn check_schedulable(&self, requests: &[ToolCallRequest]) -> Result<(), OrchestrationError> {
        if !self.is_initialized() {
            return Err(OrchestrationError::NotInitialized);
        }
        if let Some(batch) = self.inner.state.lock().as_ref() {
            return Err(OrchestrationError::Busy {
                batch_id: batch.id(),
                live: batch.live_count(),
            });
        }

        let mut seen = HashSet::with_capacity(requests.len());
        for request in requests {
            if !seen.insert(request.call_id.as_str()) {
                return Err(OrchestrationError::DuplicateCallId {
                    call_id: request.call_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Creates a batch and drives each call through validation.
    ///
    /// Calls that need no confirmation start executing immediately. Raising
    /// `signal` cancels every call still live in the batch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &self,
        requests: Vec<ToolCallRequest>,
        signal: &Arc<CancellationToken>,
    ) -> Result<BatchId, OrchestrationError> {
        let registry = self
            .inner
            .registry
            .read()
            .clone()
            .ok_or(OrchestrationError::NotInitialized)?;

        // Tool hooks run before the state lock is taken.
        let resolutions: Vec<Resolution> = requests
            .iter()
            .map(|request| self.inner.resolve(&registry, request))
            .collect();

        let (batch_id, jobs) = {
            let mut state = self.inner.state.lock();
            if let Some(active) = state.as_ref() {
                return Err(OrchestrationError::Busy {
                    batch_id: active.id(),
                    live: active.live_count(),
                });
            }

            let mut batch = Batch::new(requests)?;
            let batch_id = batch.id();
            info!(batch_id = %batch_id, calls = batch.calls().len(), "Scheduling tool batch");
            self.inner.publish_snapshot(&batch);

            let mut jobs = Vec::new();
            for (call_id, resolution) in batch.call_ids().into_iter().zip(resolutions) {
                if let Some(job) = self.inner.apply_resolution(&mut batch, &call_id, resolution) {
                    jobs.push(job);
                }
                self.inner.publish_snapshot(&batch);
            }

            *state = Some(batch);
            self.inner.complete_if_settled(&mut state);
            (batch_id, jobs)
        };

        let weak = Arc::downgrade(&self.inner);
        let observed = Arc::downgrade(signal);
        let hook = signal.on_cancel(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let reason = observed
                .upgrade()
                .and_then(|signal| signal.reason())
                .unwrap_or_else(|| "cancelled".to_string());
            inner.cancel_batch(batch_id, &reason);
        });
        self.inner.attach_signal(batch_id, signal, hook);

        for job in jobs {
            execution::spawn(&self.inner, job);
        }
        Ok(batch_id)
    }

    /// Applies a confirmation outcome to a call awaiting approval.
    ///
    /// `signal`, when given, cancels only this call's execution once raised.
    pub fn handle_confirmation_response(
        &self,
        call_id: &str,
        outcome: ConfirmationOutcome,
        signal: Option<Arc<CancellationToken>>,
    ) -> Result<(), OrchestrationError> {
        let (on_confirm, job) = {
            let mut state = self.inner.state.lock();
            let batch = state
                .as_mut()
                .ok_or_else(|| OrchestrationError::not_found(call_id))?;
            let call = batch
                .get_mut(call_id)
                .ok_or_else(|| OrchestrationError::not_found(call_id))?;
            if call.status != ToolCallStatus::AwaitingApproval {
                return Err(OrchestrationError::invalid_state(call_id, call.status));
            }

            call.outcome = Some(outcome);
            let on_confirm = call
                .confirmation_details
                .as_ref()
                .and_then(|details| details.on_confirm.clone());
            let tool_name = call.request.name.clone();
            let args = call.request.args.clone();
            info!(call_id = %call_id, tool = %tool_name, outcome = %outcome, "Confirmation received");

            let mut job = None;
            if outcome.is_proceed() {
                if outcome == ConfirmationOutcome::ProceedAlways {
                    self.inner.policy.elevate_trust(&tool_name);
                }
                batch.transition(call_id, ToolCallStatus::Executing)?;
                let tool = batch
                    .tool(call_id)
                    .ok_or_else(|| OrchestrationError::not_found(call_id))?;
                let mut tokens = vec![batch.token().clone()];
                tokens.extend(signal);
                job = Some(ExecutionJob {
                    batch_id: batch.id(),
                    call_id: call_id.to_string(),
                    tool,
                    args,
                    tokens,
                });
            } else if outcome == ConfirmationOutcome::Cancel {
                batch.finish(
                    call_id,
                    ToolCallResult::Cancelled {
                        reason: USER_CANCEL_REASON.to_string(),
                    },
                )?;
            }

            self.inner.publish_snapshot(batch);
            self.inner.complete_if_settled(&mut state);
            (on_confirm, job)
        };

        if let Some(callback) = on_confirm {
            callback(outcome);
        }
        if let Some(job) = job {
            execution::spawn(&self.inner, job);
        }
        Ok(())
    }

    /// Replaces the arguments of a call awaiting approval.
    ///
    /// The confirmation description is refreshed and the snapshot republished.
    pub fn update_pending_args(
        &self,
        call_id: &str,
        args: serde_json::Value,
    ) -> Result<(), OrchestrationError> {
        let tool = {
            let state = self.inner.state.lock();
            let batch = state
                .as_ref()
                .ok_or_else(|| OrchestrationError::not_found(call_id))?;
            pending_call(batch, call_id)?;
            batch.tool(call_id)
        };
        let description = tool.map(|tool| tool.describe(&args));

        let mut state = self.inner.state.lock();
        let batch = state
            .as_mut()
            .ok_or_else(|| OrchestrationError::not_found(call_id))?;
        pending_call(batch, call_id)?;
        let Some(call) = batch.get_mut(call_id) else {
            return Err(OrchestrationError::not_found(call_id));
        };
        if let (Some(description), Some(details)) = (description, call.confirmation_details.as_mut()) {
            details.description = description;
        }
        call.request.args = args;
        debug!(call_id = %call_id, "Pending arguments updated");

        self.inner.publish_snapshot(batch);
        Ok(())
    }

    /// Cancels every live call in the active batch.
    ///
    /// Returns the number of calls cancelled. Running tools observe the batch
    /// token; tools that ignore it are dropped at their next await point.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let Some(batch_id) = self.active_batch_id() else {
            return 0;
        };
        self.inner.cancel_batch(batch_id, reason)
    }

    /// Returns the active batch id, if any.
    #[must_use]
    pub fn active_batch_id(&self) -> Option<BatchId> {
        self.inner.state.lock().as_ref().map(Batch::id)
    }

    /// Returns snapshots of the non-terminal calls in the active batch.
    #[must_use]
    pub fn live_calls(&self) -> Vec<ToolCall> {
        self.inner
            .state
            .lock()
            .as_ref()
            .map(|batch| {
                batch
                    .calls()
                    .iter()
                    .filter(|c| c.status.is_live())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a snapshot of one call in the active batch.
    #[must_use]
    pub fn get_call(&self, call_id: &str) -> Option<ToolCall> {
        self.inner
            .state
            .lock()
            .as_ref()
            .and_then(|batch| batch.get(call_id).cloned())
    }

    /// Returns snapshots of calls awaiting approval.
    #[must_use]
    pub fn pending_confirmations(&self) -> Vec<ToolCall> {
        self.live_calls()
            .into_iter()
            .filter(|c| c.status == ToolCallStatus::AwaitingApproval)
            .collect()
    }
}

impl std::fmt::Debug for ToolCallScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallScheduler")
            .field("initialized", &self.is_initialized())
            .field("policy", &self.inner.policy)
            .field("active_batch", &self.active_batch_id())
            .finish()
    }
}

impl SchedulerInner {
    /// Looks up the tool and checks the arguments for one request.
    ///
    /// Runs every tool hook validation needs, so it must not be called with
    /// the state lock held.
    fn resolve(&self, registry: &ToolRegistry, request: &ToolCallRequest) -> Resolution {
        let tool = match registry.resolve(&request.name).and_then(|tool| {
            check_args(tool.as_ref(), &request.args)?;
            Ok(tool)
        }) {
            Ok(tool) => tool,
            Err(err) => return Resolution::Rejected(err),
        };

        let definition = tool.definition();
        let details = self.policy.requires_confirmation(definition).then(|| {
            let mut details = ConfirmationDetails::new(
                definition.approval_title(),
                tool.describe(&request.args),
                definition.kind,
            );
            details.on_confirm = tool.on_confirm();
            details
        });
        Resolution::Resolved { tool, details }
    }

    /// Moves one call out of `validating`.
    ///
    /// Returns a job when the call should start executing.
    fn apply_resolution(
        &self,
        batch: &mut Batch,
        call_id: &str,
        resolution: Resolution,
    ) -> Option<ExecutionJob> {
        let (tool, details) = match resolution {
            Resolution::Rejected(err) => {
                warn!(call_id = %call_id, error = %err, "Tool call rejected");
                log_rejected(batch.finish(call_id, ToolCallResult::Error(err)));
                return None;
            }
            Resolution::Resolved { tool, details } => (tool, details),
        };
        batch.bind_tool(call_id, tool.clone());

        if let Some(details) = details {
            log_rejected(batch.await_approval(call_id, details));
            return None;
        }
        let started = batch.transition(call_id, ToolCallStatus::Executing);
        if started.is_err() {
            log_rejected(started);
            return None;
        }
        Some(ExecutionJob {
            batch_id: batch.id(),
            call_id: call_id.to_string(),
            tool,
            args: batch.get(call_id)?.request.args.clone(),
            tokens: vec![batch.token().clone()],
        })
    }

    /// Keeps the signal hook with its batch, or drops it if the batch settled.
    fn attach_signal(&self, batch_id: BatchId, signal: &Arc<CancellationToken>, hook: CallbackId) {
        let mut state = self.state.lock();
        match state.as_mut().filter(|batch| batch.id() == batch_id) {
            Some(batch) => batch.set_signal_hook(Arc::clone(signal), hook),
            None => {
                signal.remove_callback(hook);
            }
        }
    }

    pub(crate) fn is_executing(&self, batch_id: BatchId, call_id: &str) -> bool {
        self.state
            .lock()
            .as_ref()
            .filter(|batch| batch.id() == batch_id)
            .and_then(|batch| batch.get(call_id))
            .is_some_and(|call| call.status == ToolCallStatus::Executing)
    }

    /// Appends output for an executing call; late output is dropped.
    pub(crate) fn append_output(&self, batch_id: BatchId, call_id: &str, chunk: String) {
        let mut state = self.state.lock();
        let Some(batch) = state.as_mut().filter(|batch| batch.id() == batch_id) else {
            debug!(call_id = %call_id, "Ignoring output for a settled batch");
            return;
        };
        let Some(call) = batch
            .get_mut(call_id)
            .filter(|call| call.status == ToolCallStatus::Executing)
        else {
            debug!(call_id = %call_id, "Ignoring output for a call no longer executing");
            return;
        };

        call.output_chunks.push(chunk.clone());
        self.send(SchedulerUpdate::OutputChunk {
            batch_id,
            call_id: call_id.to_string(),
            chunk,
            calls: batch.snapshot(),
        });
    }

    /// Records a tool's result unless the call already left `executing`.
    pub(crate) fn complete_execution(&self, batch_id: BatchId, call_id: &str, result: ToolCallResult) {
        let mut state = self.state.lock();
        let Some(batch) = state.as_mut().filter(|batch| batch.id() == batch_id) else {
            debug!(call_id = %call_id, "Ignoring result for a settled batch");
            return;
        };
        if !batch
            .get(call_id)
            .is_some_and(|call| call.status == ToolCallStatus::Executing)
        {
            debug!(call_id = %call_id, "Ignoring late tool result");
            return;
        }

        if let ToolCallResult::Error(ref err) = result {
            warn!(call_id = %call_id, error = %err, "Tool execution failed");
        }
        log_rejected(batch.finish(call_id, result));
        self.publish_snapshot(batch);
        self.complete_if_settled(&mut state);
    }

    /// Cancels one call if it is still live.
    pub(crate) fn cancel_call(&self, batch_id: BatchId, call_id: &str, reason: &str) {
        let mut state = self.state.lock();
        let Some(batch) = state.as_mut().filter(|batch| batch.id() == batch_id) else {
            return;
        };
        if !batch.get(call_id).is_some_and(|call| call.status.is_live()) {
            return;
        }

        info!(call_id = %call_id, reason = %reason, "Tool call cancelled");
        log_rejected(batch.finish(
            call_id,
            ToolCallResult::Cancelled {
                reason: reason.to_string(),
            },
        ));
        self.publish_snapshot(batch);
        self.complete_if_settled(&mut state);
    }

    /// Cancels every live call in `batch_id` and raises the batch token.
    fn cancel_batch(&self, batch_id: BatchId, reason: &str) -> usize {
        let (cancelled, token) = {
            let mut state = self.state.lock();
            let Some(batch) = state.as_mut().filter(|batch| batch.id() == batch_id) else {
                return 0;
            };

            let live = batch.live_ids();
            for call_id in &live {
                log_rejected(batch.finish(
                    call_id,
                    ToolCallResult::Cancelled {
                        reason: reason.to_string(),
                    },
                ));
                self.publish_snapshot(batch);
            }
            let token = batch.token().clone();
            info!(batch_id = %batch_id, cancelled = live.len(), reason = %reason, "Batch cancelled");

            self.complete_if_settled(&mut state);
            (live.len(), token)
        };

        token.cancel(reason);
        cancelled
    }

    /// Sends the completion update and drops the batch once every call is terminal.
    fn complete_if_settled(&self, state: &mut Option<Batch>) {
        if !state.as_ref().is_some_and(Batch::is_settled) {
            return;
        }
        let Some(mut batch) = state.take() else {
            return;
        };
        batch.detach_signal();

        let batch_id = batch.id();
        let duration_ms = SpanTimer::since("tool.batch", batch.started()).finish();
        let calls = batch.snapshot();
        self.wide_events.emit_batch_event(batch_id, &calls, duration_ms);
        self.send(SchedulerUpdate::BatchComplete { batch_id, calls });
    }

    fn publish_snapshot(&self, batch: &Batch) {
        self.send(SchedulerUpdate::CallsUpdated {
            batch_id: batch.id(),
            calls: batch.snapshot(),
        });
    }

    fn send(&self, update: SchedulerUpdate) {
        let kind = update.kind();
        if self.updates.send(update).is_err() {
            debug!(update = kind, "No update receiver, dropping scheduler update");
        }
    }
}

/// How validation left a request, computed before the batch is locked.
enum Resolution {
    Rejected(ToolError),
    Resolved {
        tool: Arc<dyn Tool>,
        details: Option<ConfirmationDetails>,
    },
}

fn pending_call<'a>(batch: &'a Batch, call_id: &str) -> Result<&'a ToolCall, OrchestrationError> {
    let call = batch
        .get(call_id)
        .ok_or_else(|| OrchestrationError::not_found(call_id))?;
    if call.status != ToolCallStatus::AwaitingApproval {
        return Err(OrchestrationError::invalid_state(call_id, call.status));
    }
    Ok(call)
}

fn log_rejected(result: Result<(), OrchestrationError>) {
    if let Err(err) = result {
        warn!(error = %err, "Rejected tool call transition");
    }
}

fn check_args(tool: &dyn Tool, args: &serde_json::Value) -> Result<(), ToolError> {
    let name = tool.name();
    tool.definition()
        .check_args_shape(args)
        .and_then(|()| tool.validate_args(args))
        .map_err(|reason| ToolError::invalid_arguments(name, reason))
}
