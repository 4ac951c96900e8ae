//! Tool call requests, records and results.

use super::{ConfirmationOutcome, ToolCallStatus};
use crate::errors::ToolError;
use crate::tools::{ToolKind, ToolOutput};
use crate::utils::generate_call_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Callback invoked when a pending confirmation is resolved.
pub type ConfirmationCallback = Arc<dyn Fn(ConfirmationOutcome) + Send + Sync>;

/// An immutable request to invoke one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique id within the batch.
    #[serde(default = "generate_call_id")]
    pub call_id: String,
    /// The tool identifier.
    pub name: String,
    /// Opaque arguments, passed to the tool verbatim.
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
}

fn empty_args() -> serde_json::Value {
    serde_json::json!({})
}

impl ToolCallRequest {
    /// Creates a request with a generated call id.
    #[must_use]
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            call_id: generate_call_id(),
            name: name.into(),
            args,
        }
    }

    /// Creates a request with a caller-supplied call id.
    #[must_use]
    pub fn with_call_id(
        call_id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            args,
        }
    }
}

/// What a human needs to decide on a pending call.
#[derive(Clone, Serialize)]
pub struct ConfirmationDetails {
    /// Short title for the prompt.
    pub title: String,
    /// Human-readable description of what will run.
    pub description: String,
    /// The kind of tool awaiting approval.
    pub kind: ToolKind,
    /// Tool-supplied continuation run once an outcome is applied.
    #[serde(skip)]
    pub on_confirm: Option<ConfirmationCallback>,
}

impl ConfirmationDetails {
    /// Creates confirmation details without a continuation.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind,
            on_confirm: None,
        }
    }

    /// Sets the continuation.
    #[must_use]
    pub fn with_on_confirm(mut self, callback: ConfirmationCallback) -> Self {
        self.on_confirm = Some(callback);
        self
    }
}

impl fmt::Debug for ConfirmationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationDetails")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("has_on_confirm", &self.on_confirm.is_some())
            .finish()
    }
}

/// The final result of a terminal tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ToolCallResult {
    /// The tool's output payload.
    Success(ToolOutput),
    /// Why the call failed.
    Error(ToolError),
    /// Why the call was cancelled.
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
}

impl ToolCallResult {
    /// Returns the status this result belongs to.
    #[must_use]
    pub fn status(&self) -> ToolCallStatus {
        match self {
            Self::Success(_) => ToolCallStatus::Success,
            Self::Error(_) => ToolCallStatus::Error,
            Self::Cancelled { .. } => ToolCallStatus::Cancelled,
        }
    }

    /// Returns a human-readable error description, if not successful.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::Error(err) => Some(err.to_string()),
            Self::Cancelled { reason } => Some(format!("Cancelled: {reason}")),
        }
    }
}

/// The mutable execution record for one requested tool invocation.
///
/// Canonical instances live inside the scheduler; everything handed out is a
/// snapshot clone.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCall {
    /// The originating request (arguments reflect any pending edit).
    pub request: ToolCallRequest,
    /// Current lifecycle status.
    pub status: ToolCallStatus,
    /// Present only while awaiting approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_details: Option<ConfirmationDetails>,
    /// Present only in terminal states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolCallResult>,
    /// Incremental output, in arrival order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_chunks: Vec<String>,
    /// The last confirmation outcome applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ConfirmationOutcome>,
    /// Wall time from scheduling to the terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolCall {
    pub(crate) fn new(request: ToolCallRequest) -> Self {
        Self {
            request,
            status: ToolCallStatus::Validating,
            confirmation_details: None,
            result: None,
            output_chunks: Vec::new(),
            outcome: None,
            duration_ms: None,
        }
    }

    /// Returns the call id.
    #[must_use]
    pub fn call_id(&self) -> &str {
        &self.request.call_id
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.request.name
    }

    /// Returns true once the call can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns all output chunks joined together.
    #[must_use]
    pub fn output_text(&self) -> String {
        self.output_chunks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_generates_call_id() {
        let a = ToolCallRequest::new("list_dir", serde_json::json!({}));
        let b = ToolCallRequest::new("list_dir", serde_json::json!({}));

        assert!(!a.call_id.is_empty());
        assert_ne!(a.call_id, b.call_id);
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let req: ToolCallRequest = serde_json::from_str(r#"{"name": "exec"}"#).unwrap();

        assert_eq!(req.name, "exec");
        assert!(!req.call_id.is_empty());
        assert_eq!(req.args, serde_json::json!({}));
    }

    #[test]
    fn test_new_call_is_validating() {
        let call = ToolCall::new(ToolCallRequest::with_call_id("a", "read", serde_json::json!({})));

        assert_eq!(call.call_id(), "a");
        assert_eq!(call.status, ToolCallStatus::Validating);
        assert!(call.confirmation_details.is_none());
        assert!(call.result.is_none());
    }

    #[test]
    fn test_result_status_and_message() {
        let ok = ToolCallResult::Success(ToolOutput::ok(None));
        assert_eq!(ok.status(), ToolCallStatus::Success);
        assert!(ok.error_message().is_none());

        let cancelled = ToolCallResult::Cancelled {
            reason: "user".to_string(),
        };
        assert_eq!(cancelled.status(), ToolCallStatus::Cancelled);
        assert_eq!(cancelled.error_message().unwrap(), "Cancelled: user");
    }

    #[test]
    fn test_result_serialization_is_adjacently_tagged() {
        let result = ToolCallResult::Error(ToolError::unknown_tool("nope"));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["detail"]["kind"], "unknown_tool");
    }

    #[test]
    fn test_confirmation_details_debug_hides_callback() {
        let details = ConfirmationDetails::new("Run exec", "rm -rf /", ToolKind::Execute)
            .with_on_confirm(Arc::new(|_| {}));
        let debug = format!("{details:?}");

        assert!(debug.contains("has_on_confirm: true"));
    }
}
