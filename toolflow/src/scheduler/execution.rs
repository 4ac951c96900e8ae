//! Tool execution tasks.

use super::SchedulerInner;
use crate::cancellation::{CancellationToken, LinkedToken};
use crate::core::{BatchId, ToolCallResult};
use crate::errors::ToolError;
use crate::tools::{OutputChunkSink, Tool, ToolInvocation, ToolOutput};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, Instrument};

/// Everything needed to run one approved call.
pub(super) struct ExecutionJob {
    pub(super) batch_id: BatchId,
    pub(super) call_id: String,
    pub(super) tool: Arc<dyn Tool>,
    pub(super) args: serde_json::Value,
    /// Raising any of these cancels the call. The first is the batch token.
    pub(super) tokens: Vec<Arc<CancellationToken>>,
}

/// Spawns the job on the current tokio runtime.
pub(super) fn spawn(inner: &Arc<SchedulerInner>, job: ExecutionJob) {
    let span = tracing::info_span!(
        "tool.execute",
        batch_id = %job.batch_id,
        call_id = %job.call_id,
        tool = %job.tool.name()
    );
    tokio::spawn(run(Arc::clone(inner), job).instrument(span));
}

async fn run(inner: Arc<SchedulerInner>, job: ExecutionJob) {
    let ExecutionJob {
        batch_id,
        call_id,
        tool,
        args,
        tokens,
    } = job;

    if !inner.is_executing(batch_id, &call_id) {
        debug!("Call left executing before its task started");
        return;
    }

    let output = {
        let weak = Arc::downgrade(&inner);
        let call_id = call_id.clone();
        OutputChunkSink::new(move |chunk| {
            if let Some(inner) = weak.upgrade() {
                inner.append_output(batch_id, &call_id, chunk);
            }
        })
    };
    let cancel = LinkedToken::new(&tokens);
    let invocation = ToolInvocation {
        call_id: call_id.clone(),
        args,
        output,
        cancel: Arc::clone(cancel.token()),
    };
    let execution = AssertUnwindSafe(tool.execute(invocation)).catch_unwind();

    tokio::select! {
        biased;
        () = cancel.token().cancelled() => {
            let reason = cancel
                .token()
                .reason()
                .unwrap_or_else(|| "cancelled".to_string());
            inner.cancel_call(batch_id, &call_id, &reason);
        }
        caught = execution => {
            let outcome = caught.unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(call_id = %call_id, panic = %message, "Tool panicked");
                Err(ToolError::execution_failure(
                    tool.name(),
                    format!("tool panicked: {message}"),
                ))
            });
            inner.complete_execution(batch_id, &call_id, outcome_to_result(tool.name(), outcome));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Maps what a tool returned to the call's terminal result.
pub(super) fn outcome_to_result(
    tool_name: &str,
    outcome: Result<ToolOutput, ToolError>,
) -> ToolCallResult {
    match outcome {
        Ok(output) if output.success => ToolCallResult::Success(output),
        Ok(output) => ToolCallResult::Error(ToolError::execution_failure(
            tool_name,
            output
                .error
                .unwrap_or_else(|| "tool reported failure".to_string()),
        )),
        Err(err @ ToolError::ExecutionFailure { .. }) => ToolCallResult::Error(err),
        Err(err) => ToolCallResult::Error(ToolError::execution_failure(tool_name, err.to_string())),
    }
}
