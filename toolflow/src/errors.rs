//! Error types for the toolflow engine.
//!
//! Two families exist. [`ToolError`] describes why a single tool call ended in
//! the `error` state; it is recorded in the call result and never aborts the
//! batch. [`OrchestrationError`] is a structural failure of the scheduling or
//! confirmation call itself and is returned to the immediate caller.

use crate::core::ToolCallStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The umbrella error type for toolflow operations.
#[derive(Debug, Error)]
pub enum ToolflowError {
    /// A structural orchestration failure.
    #[error("{0}")]
    Orchestration(#[from] OrchestrationError),

    /// A per-call tool failure.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural failures surfaced synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// The scheduler was used before a tool registry was installed.
    #[error("Scheduler not initialized: no tool registry installed")]
    NotInitialized,

    /// No call with this id exists in the active batch.
    #[error("Tool call not found: {call_id}")]
    NotFound {
        /// The requested call id.
        call_id: String,
    },

    /// The call exists but is not awaiting approval.
    #[error("Tool call {call_id} is {status}, expected awaiting_approval")]
    InvalidState {
        /// The requested call id.
        call_id: String,
        /// The call's current status.
        status: ToolCallStatus,
    },

    /// An unrecognized confirmation outcome value.
    #[error("Unrecognized confirmation outcome: '{value}'")]
    InvalidArgument {
        /// The raw value received.
        value: String,
    },

    /// Two requests in one batch share a call id.
    #[error("Duplicate call id in batch: {call_id}")]
    DuplicateCallId {
        /// The repeated call id.
        call_id: String,
    },

    /// Another batch still has live calls.
    #[error("Batch {batch_id} still has {live} live tool calls")]
    Busy {
        /// The active batch.
        batch_id: Uuid,
        /// Number of non-terminal calls in it.
        live: usize,
    },
}

impl OrchestrationError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(call_id: impl Into<String>) -> Self {
        Self::NotFound {
            call_id: call_id.into(),
        }
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(call_id: impl Into<String>, status: ToolCallStatus) -> Self {
        Self::InvalidState {
            call_id: call_id.into(),
            status,
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            value: value.into(),
        }
    }

    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::DuplicateCallId { .. } => "DUPLICATE_CALL_ID",
            Self::Busy { .. } => "BUSY",
        }
    }
}

/// Errors that resolve a single tool call to the `error` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    /// Tool was not found in the registry.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The tool name.
        name: String,
    },

    /// The arguments failed the basic shape check.
    #[error("Invalid arguments for {name}: {reason}")]
    InvalidArguments {
        /// The tool name.
        name: String,
        /// Why the arguments were rejected.
        reason: String,
    },

    /// The tool reported a failure while executing.
    #[error("Tool execution failed: {name} - {reason}")]
    ExecutionFailure {
        /// The tool name.
        name: String,
        /// The tool's own error detail.
        reason: String,
    },
}

impl ToolError {
    /// Creates an unknown tool error.
    #[must_use]
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Creates an invalid arguments error.
    #[must_use]
    pub fn invalid_arguments(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failure error.
    #[must_use]
    pub fn execution_failure(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the name of the tool the error refers to.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::UnknownTool { name }
            | Self::InvalidArguments { name, .. }
            | Self::ExecutionFailure { name, .. } => name,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::UnknownTool { name } => {
                map.insert("type".to_string(), serde_json::json!("UnknownTool"));
                map.insert("name".to_string(), serde_json::json!(name));
            }
            Self::InvalidArguments { name, reason } => {
                map.insert("type".to_string(), serde_json::json!("InvalidArguments"));
                map.insert("name".to_string(), serde_json::json!(name));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::ExecutionFailure { name, reason } => {
                map.insert("type".to_string(), serde_json::json!("ExecutionFailure"));
                map.insert("name".to_string(), serde_json::json!(name));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_to_dict() {
        let err = ToolError::unknown_tool("my_tool");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "UnknownTool");
        assert_eq!(dict.get("name").unwrap(), "my_tool");
        assert_eq!(dict.get("message").unwrap(), "Unknown tool: my_tool");
    }

    #[test]
    fn test_tool_error_serialize_tagged() {
        let err = ToolError::execution_failure("exec", "exit 1");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["kind"], "execution_failure");
        assert_eq!(json["reason"], "exit 1");

        let back: ToolError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_orchestration_error_messages() {
        let err = OrchestrationError::invalid_state("b", ToolCallStatus::Executing);
        assert_eq!(
            err.to_string(),
            "Tool call b is executing, expected awaiting_approval"
        );
        assert_eq!(err.code(), "INVALID_STATE");

        assert_eq!(OrchestrationError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(OrchestrationError::NotInitialized.code(), "NOT_INITIALIZED");
    }

    #[test]
    fn test_umbrella_conversion() {
        let err: ToolflowError = OrchestrationError::invalid_argument("maybe").into();
        assert!(matches!(err, ToolflowError::Orchestration(_)));
        assert!(err.to_string().contains("maybe"));
    }
}
