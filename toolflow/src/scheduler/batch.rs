//! The call table for one scheduled batch.

use crate::cancellation::{CallbackId, CancellationToken};
use crate::core::{
    BatchId, ConfirmationDetails, ToolCall, ToolCallRequest, ToolCallResult, ToolCallStatus,
};
use crate::errors::OrchestrationError;
use crate::tools::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Ordered calls of one batch, indexed by call id.
///
/// All mutation goes through [`Batch::transition`], [`Batch::await_approval`]
/// and [`Batch::finish`], which enforce the lifecycle graph and keep
/// `confirmation_details` present exactly while awaiting approval.
pub(crate) struct Batch {
    id: BatchId,
    started: Instant,
    calls: Vec<ToolCall>,
    index: HashMap<String, usize>,
    tools: HashMap<String, Arc<dyn Tool>>,
    token: Arc<CancellationToken>,
    /// The hook linking the caller's signal to this batch.
    signal_hook: Option<(Arc<CancellationToken>, CallbackId)>,
}

impl Batch {
    /// Creates a batch with every call `validating`.
    pub(crate) fn new(requests: Vec<ToolCallRequest>) -> Result<Self, OrchestrationError> {
        let mut index = HashMap::with_capacity(requests.len());
        let mut calls = Vec::with_capacity(requests.len());

        for (position, request) in requests.into_iter().enumerate() {
            if index.insert(request.call_id.clone(), position).is_some() {
                return Err(OrchestrationError::DuplicateCallId {
                    call_id: request.call_id,
                });
            }
            calls.push(ToolCall::new(request));
        }

        Ok(Self {
            id: crate::utils::generate_uuid(),
            started: Instant::now(),
            calls,
            index,
            tools: HashMap::new(),
            token: CancellationToken::shared(),
            signal_hook: None,
        })
    }

    pub(crate) fn id(&self) -> BatchId {
        self.id
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }

    /// The batch-wide cancellation token handed to tools.
    pub(crate) fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    pub(crate) fn set_signal_hook(&mut self, signal: Arc<CancellationToken>, id: CallbackId) {
        self.signal_hook = Some((signal, id));
    }

    /// Unregisters the signal hook, if any.
    pub(crate) fn detach_signal(&mut self) {
        if let Some((signal, id)) = self.signal_hook.take() {
            signal.remove_callback(id);
        }
    }

    pub(crate) fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    pub(crate) fn get(&self, call_id: &str) -> Option<&ToolCall> {
        self.index.get(call_id).map(|&i| &self.calls[i])
    }

    pub(crate) fn get_mut(&mut self, call_id: &str) -> Option<&mut ToolCall> {
        match self.index.get(call_id) {
            Some(&i) => self.calls.get_mut(i),
            None => None,
        }
    }

    pub(crate) fn call_ids(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.call_id().to_string()).collect()
    }

    pub(crate) fn live_ids(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|c| c.status.is_live())
            .map(|c| c.call_id().to_string())
            .collect()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.calls.iter().filter(|c| c.status.is_live()).count()
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.calls.iter().all(ToolCall::is_terminal)
    }

    pub(crate) fn snapshot(&self) -> Vec<ToolCall> {
        self.calls.clone()
    }

    pub(crate) fn bind_tool(&mut self, call_id: &str, tool: Arc<dyn Tool>) {
        self.tools.insert(call_id.to_string(), tool);
    }

    pub(crate) fn tool(&self, call_id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(call_id).cloned()
    }

    /// Moves a call to a live status other than `awaiting_approval`.
    pub(crate) fn transition(
        &mut self,
        call_id: &str,
        next: ToolCallStatus,
    ) -> Result<(), OrchestrationError> {
        self.apply(call_id, next, None, None)
    }

    /// Moves a call to `awaiting_approval` with its prompt.
    pub(crate) fn await_approval(
        &mut self,
        call_id: &str,
        details: ConfirmationDetails,
    ) -> Result<(), OrchestrationError> {
        self.apply(call_id, ToolCallStatus::AwaitingApproval, Some(details), None)
    }

    /// Moves a call to the terminal status matching `result`.
    pub(crate) fn finish(
        &mut self,
        call_id: &str,
        result: ToolCallResult,
    ) -> Result<(), OrchestrationError> {
        self.apply(call_id, result.status(), None, Some(result))
    }

    fn apply(
        &mut self,
        call_id: &str,
        next: ToolCallStatus,
        details: Option<ConfirmationDetails>,
        result: Option<ToolCallResult>,
    ) -> Result<(), OrchestrationError> {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let batch_id = self.id;
        let call = self
            .get_mut(call_id)
            .ok_or_else(|| OrchestrationError::not_found(call_id))?;

        if !call.status.can_transition_to(next) {
            return Err(OrchestrationError::invalid_state(call_id, call.status));
        }

        let previous = call.status;
        call.status = next;
        call.confirmation_details = if next == ToolCallStatus::AwaitingApproval {
            details
        } else {
            None
        };
        if next.is_terminal() {
            call.result = result;
            call.duration_ms = Some(elapsed_ms);
        }

        debug!(
            batch_id = %batch_id,
            call_id = %call_id,
            tool = %call.request.name,
            from = %previous,
            to = %next,
            "Tool call transition"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.id)
            .field("calls", &self.calls.len())
            .field("live", &self.live_count())
            .finish_non_exhaustive()
    }
}
