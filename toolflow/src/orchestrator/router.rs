//! Maps scheduler updates to outward events on the current channel.

use crate::core::{
    BatchId, ProgressKind, ToolCall, ToolCallRequest, ToolCallResult, ToolCallStatus, ToolEvent,
};
use crate::errors::OrchestrationError;
use crate::events::OutputChannel;
use crate::scheduler::SchedulerUpdate;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Callback invoked with the terminal calls of each completed batch.
pub type CompletionCallback = Arc<dyn Fn(&[ToolCall]) + Send + Sync>;

/// The current output channel and its de-duplication state.
#[derive(Default)]
struct ChannelState {
    channel: Option<Arc<dyn OutputChannel>>,
    batch_id: Option<BatchId>,
    /// Call ids that already had a confirmation request emitted.
    confirmations_sent: HashSet<String>,
    /// Last status routed per call id.
    last_status: HashMap<String, ToolCallStatus>,
}

impl ChannelState {
    fn release(&mut self) {
        self.channel = None;
        self.batch_id = None;
        self.confirmations_sent.clear();
        self.last_status.clear();
    }

    fn is_bound_to(&self, batch_id: BatchId) -> bool {
        self.channel.is_some() && self.batch_id == Some(batch_id)
    }

    fn route(&mut self, update: &SchedulerUpdate) {
        let Some(channel) = self.channel.clone() else {
            return;
        };

        match update {
            SchedulerUpdate::CallsUpdated { calls, .. } => self.route_statuses(channel.as_ref(), calls),
            SchedulerUpdate::OutputChunk { call_id, chunk, .. } => {
                channel.emit(ToolEvent::progress(
                    call_id.clone(),
                    ProgressKind::Output {
                        chunk: chunk.clone(),
                    },
                ));
            }
            SchedulerUpdate::BatchComplete { batch_id, calls } => {
                self.route_statuses(channel.as_ref(), calls);
                for call in calls {
                    channel.emit(ToolEvent::result(call));
                }
                channel.emit(ToolEvent::batch_complete(*batch_id, calls));
            }
        }
    }

    fn route_statuses(&mut self, channel: &dyn OutputChannel, calls: &[ToolCall]) {
        for call in calls {
            let previous = self
                .last_status
                .insert(call.call_id().to_string(), call.status);
            if previous == Some(call.status) {
                continue;
            }

            match call.status {
                ToolCallStatus::AwaitingApproval => {
                    if self.confirmations_sent.insert(call.call_id().to_string()) {
                        if let Some(event) = ToolEvent::confirmation_request(call) {
                            channel.emit(event);
                        }
                    }
                }
                ToolCallStatus::Executing => {
                    channel.emit(ToolEvent::progress(
                        call.call_id(),
                        ProgressKind::ExecutionStarted,
                    ));
                }
                ToolCallStatus::Cancelled => {
                    let reason = call
                        .result
                        .as_ref()
                        .and_then(|r| match r {
                            ToolCallResult::Cancelled { reason } => Some(reason.clone()),
                            _ => None,
                        })
                        .unwrap_or_else(|| "cancelled".to_string());
                    channel.emit(ToolEvent::progress(
                        call.call_id(),
                        ProgressKind::Cancelled { reason },
                    ));
                }
                ToolCallStatus::Error => {
                    let error = call
                        .result
                        .as_ref()
                        .and_then(ToolCallResult::error_message)
                        .unwrap_or_else(|| "tool call failed".to_string());
                    channel.emit(ToolEvent::progress(
                        call.call_id(),
                        ProgressKind::Failed { error },
                    ));
                }
                ToolCallStatus::Validating | ToolCallStatus::Success => {}
            }
        }
    }
}

/// Routes updates for the batch bound to the current channel.
#[derive(Default)]
pub(crate) struct EventRouter {
    state: Mutex<ChannelState>,
    on_complete: RwLock<Option<CompletionCallback>>,
}

impl EventRouter {
    /// Makes `channel` current, emits a started event per request and binds
    /// the batch returned by `schedule`.
    ///
    /// The channel is released again if `schedule` fails.
    pub(crate) fn bind<F>(
        &self,
        channel: Arc<dyn OutputChannel>,
        requests: &[ToolCallRequest],
        schedule: F,
    ) -> Result<BatchId, OrchestrationError>
    where
        F: FnOnce() -> Result<BatchId, OrchestrationError>,
    {
        let mut state = self.state.lock();
        state.release();
        state.channel = Some(channel.clone());

        for request in requests {
            channel.emit(ToolEvent::started(request));
        }

        match schedule() {
            Ok(batch_id) => {
                state.batch_id = Some(batch_id);
                Ok(batch_id)
            }
            Err(err) => {
                state.release();
                Err(err)
            }
        }
    }

    /// Drops the current channel and clears de-duplication state.
    pub(crate) fn release(&self) {
        self.state.lock().release();
    }

    pub(crate) fn has_channel(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    pub(crate) fn bound_batch(&self) -> Option<BatchId> {
        self.state.lock().batch_id
    }

    pub(crate) fn set_on_complete(&self, callback: CompletionCallback) {
        *self.on_complete.write() = Some(callback);
    }

    /// Routes one update. Completion releases the channel and then runs the
    /// completion callback outside the lock.
    pub(crate) fn handle_update(&self, update: SchedulerUpdate) {
        let completed = {
            let mut state = self.state.lock();
            let bound = state.is_bound_to(update.batch_id());
            if bound {
                state.route(&update);
            } else {
                debug!(
                    batch_id = %update.batch_id(),
                    update = update.kind(),
                    "No channel bound to batch, dropping update"
                );
            }

            match update {
                SchedulerUpdate::BatchComplete { calls, .. } => {
                    if bound {
                        state.release();
                    }
                    Some(calls)
                }
                SchedulerUpdate::CallsUpdated { .. } | SchedulerUpdate::OutputChunk { .. } => None,
            }
        };

        if let Some(calls) = completed {
            let callback = self.on_complete.read().clone();
            if let Some(callback) = callback {
                callback(&calls);
            }
        }
    }
}
