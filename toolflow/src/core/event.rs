//! Outward events streamed to an output channel.

use super::{ToolCall, ToolCallRequest, ToolCallResult, ToolCallStatus};
use crate::tools::ToolKind;
use serde::Serialize;
use uuid::Uuid;

/// Progress emitted for a call while it is live, or when it fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "progress", rename_all = "snake_case")]
pub enum ProgressKind {
    /// The call entered `executing`.
    ExecutionStarted,
    /// A chunk of tool output.
    Output {
        /// The chunk text.
        chunk: String,
    },
    /// The call was cancelled.
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
    /// The call failed.
    Failed {
        /// Error description.
        error: String,
    },
}

impl ProgressKind {
    /// Returns true for failure-style progress.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Failed { .. })
    }
}

/// The payload of a [`ToolEvent`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToolEventKind {
    /// A call was accepted into a batch.
    Started {
        /// The call id.
        call_id: String,
        /// The tool name.
        name: String,
        /// The raw arguments.
        args: serde_json::Value,
    },
    /// A call needs a human decision.
    ConfirmationRequest {
        /// The call id.
        call_id: String,
        /// The tool name.
        name: String,
        /// Prompt title.
        title: String,
        /// What will run.
        description: String,
        /// The tool kind.
        kind: ToolKind,
    },
    /// Incremental progress for a call.
    Progress {
        /// The call id.
        call_id: String,
        /// What happened.
        progress: ProgressKind,
    },
    /// The terminal result of a call.
    Result {
        /// The call id.
        call_id: String,
        /// The tool name.
        name: String,
        /// Terminal status.
        status: ToolCallStatus,
        /// Final result.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<ToolCallResult>,
        /// All output chunks joined.
        #[serde(skip_serializing_if = "String::is_empty")]
        output: String,
    },
    /// Every call in a batch has settled.
    BatchComplete {
        /// The batch id.
        batch_id: Uuid,
        /// Number of calls.
        total: usize,
        /// Calls that succeeded.
        succeeded: usize,
        /// Calls that errored.
        failed: usize,
        /// Calls that were cancelled.
        cancelled: usize,
    },
}

/// A timestamped outward event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEvent {
    /// When the event was created (ISO 8601).
    pub timestamp: String,
    /// The event payload.
    #[serde(flatten)]
    pub kind: ToolEventKind,
}

impl ToolEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(kind: ToolEventKind) -> Self {
        Self {
            timestamp: crate::utils::iso_timestamp(),
            kind,
        }
    }

    /// Creates a "started" event.
    #[must_use]
    pub fn started(request: &ToolCallRequest) -> Self {
        Self::new(ToolEventKind::Started {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            args: request.args.clone(),
        })
    }

    /// Creates a "confirmation-request" event.
    ///
    /// Returns `None` when the call carries no confirmation details.
    #[must_use]
    pub fn confirmation_request(call: &ToolCall) -> Option<Self> {
        let details = call.confirmation_details.as_ref()?;
        Some(Self::new(ToolEventKind::ConfirmationRequest {
            call_id: call.call_id().to_string(),
            name: call.name().to_string(),
            title: details.title.clone(),
            description: details.description.clone(),
            kind: details.kind,
        }))
    }

    /// Creates a "progress" event.
    #[must_use]
    pub fn progress(call_id: impl Into<String>, progress: ProgressKind) -> Self {
        Self::new(ToolEventKind::Progress {
            call_id: call_id.into(),
            progress,
        })
    }

    /// Creates a "result" event from a terminal call.
    #[must_use]
    pub fn result(call: &ToolCall) -> Self {
        Self::new(ToolEventKind::Result {
            call_id: call.call_id().to_string(),
            name: call.name().to_string(),
            status: call.status,
            result: call.result.clone(),
            output: call.output_text(),
        })
    }

    /// Creates a "batch-complete" event.
    #[must_use]
    pub fn batch_complete(batch_id: Uuid, calls: &[ToolCall]) -> Self {
        let count = |status: ToolCallStatus| calls.iter().filter(|c| c.status == status).count();
        Self::new(ToolEventKind::BatchComplete {
            batch_id,
            total: calls.len(),
            succeeded: count(ToolCallStatus::Success),
            failed: count(ToolCallStatus::Error),
            cancelled: count(ToolCallStatus::Cancelled),
        })
    }

    /// Returns a dotted event type name for logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match &self.kind {
            ToolEventKind::Started { .. } => "tool.started",
            ToolEventKind::ConfirmationRequest { .. } => "tool.confirmation_request",
            ToolEventKind::Progress { .. } => "tool.progress",
            ToolEventKind::Result { .. } => "tool.result",
            ToolEventKind::BatchComplete { .. } => "batch.complete",
        }
    }

    /// Returns the call id this event refers to, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match &self.kind {
            ToolEventKind::Started { call_id, .. }
            | ToolEventKind::ConfirmationRequest { call_id, .. }
            | ToolEventKind::Progress { call_id, .. }
            | ToolEventKind::Result { call_id, .. } => Some(call_id),
            ToolEventKind::BatchComplete { .. } => None,
        }
    }

    /// Serializes the event to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
