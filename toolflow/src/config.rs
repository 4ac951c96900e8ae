//! Engine configuration.

use crate::core::ToolEvent;
use crate::errors::ToolflowError;
use crate::events::StreamingChannel;
use crate::tools::{ApprovalMode, ApprovalPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::mpsc;

/// Top-level configuration for a toolflow session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolflowConfig {
    /// Approval mode applied while validating calls.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Tools trusted from the start of the session.
    #[serde(default)]
    pub trusted_tools: Vec<String>,
    /// Reason recorded when `cancel_all` is invoked.
    #[serde(default = "default_cancel_reason")]
    pub cancel_reason: String,
    /// Queue size for streaming output channels.
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_cancel_reason() -> String {
    "cancelled by user".to_string()
}

fn default_stream_capacity() -> usize {
    256
}

impl Default for ToolflowConfig {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::default(),
            trusted_tools: Vec::new(),
            cancel_reason: default_cancel_reason(),
            stream_capacity: default_stream_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ToolflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ToolflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ToolflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Sets the approval mode.
    #[must_use]
    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    /// Adds a pre-trusted tool.
    #[must_use]
    pub fn with_trusted_tool(mut self, name: impl Into<String>) -> Self {
        self.trusted_tools.push(name.into());
        self
    }

    /// Checks field constraints.
    pub fn validate(&self) -> Result<(), ToolflowError> {
        if self.stream_capacity == 0 {
            return Err(ToolflowError::Config(
                "stream_capacity must be at least 1".to_string(),
            ));
        }
        if self.cancel_reason.trim().is_empty() {
            return Err(ToolflowError::Config(
                "cancel_reason must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the approval policy described by this configuration.
    #[must_use]
    pub fn build_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::new(self.approval_mode).with_trusted_tools(self.trusted_tools.iter().cloned())
    }

    /// Creates a bounded streaming channel sized by `stream_capacity`.
    #[must_use]
    pub fn streaming_channel(&self) -> (StreamingChannel, mpsc::Receiver<ToolEvent>) {
        StreamingChannel::new(self.stream_capacity)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Whether to emit JSON lines.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolDefinition, ToolKind};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ToolflowConfig::default();

        assert_eq!(config.approval_mode, ApprovalMode::Default);
        assert!(config.trusted_tools.is_empty());
        assert_eq!(config.cancel_reason, "cancelled by user");
        assert_eq!(config.stream_capacity, 256);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ToolflowConfig::from_json(r#"{"approval_mode": "auto_edit", "logging": {"json": true}}"#)
                .unwrap();

        assert_eq!(config.approval_mode, ApprovalMode::AutoEdit);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(matches!(
            ToolflowConfig::from_json(r#"{"approval_mode": "paranoid"}"#),
            Err(ToolflowError::Serialization(_))
        ));
        assert!(matches!(
            ToolflowConfig::from_json(r#"{"stream_capacity": 0}"#),
            Err(ToolflowError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"approval_mode": "yolo", "trusted_tools": ["exec"]}}"#).unwrap();

        let config = ToolflowConfig::from_file(file.path()).unwrap();
        assert_eq!(config.approval_mode, ApprovalMode::Yolo);
        assert_eq!(config.trusted_tools, vec!["exec".to_string()]);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ToolflowConfig::from_file(dir.path().join("missing.json"));

        assert!(matches!(result, Err(ToolflowError::Io(_))));
    }

    #[test]
    fn test_build_policy() {
        let policy = ToolflowConfig::new().with_trusted_tool("exec").build_policy();
        let exec = ToolDefinition::new("exec", ToolKind::Execute).requires_approval();

        assert_eq!(policy.mode(), ApprovalMode::Default);
        assert!(!policy.requires_confirmation(&exec));
    }

    #[test]
    fn test_streaming_channel_uses_capacity() {
        let config = ToolflowConfig::from_json(r#"{"stream_capacity": 3}"#).unwrap();
        let (channel, _rx) = config.streaming_channel();
        assert_eq!(channel.capacity(), 3);
    }
}
