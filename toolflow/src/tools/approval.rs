//! Approval policy for human-in-the-loop tool execution.

use super::ToolDefinition;
use crate::errors::ToolflowError;
use dashmap::DashSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Approval mode governing which calls need confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// The tool's declared risk governs confirmation.
    Default,
    /// Edit-type tools are auto-approved.
    AutoEdit,
    /// Everything is auto-approved.
    Yolo,
}

impl Default for ApprovalMode {
    fn default() -> Self {
        Self::Default
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::AutoEdit => write!(f, "auto_edit"),
            Self::Yolo => write!(f, "yolo"),
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = ToolflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Ok(Self::Default),
            "auto_edit" | "autoedit" => Ok(Self::AutoEdit),
            "yolo" => Ok(Self::Yolo),
            other => Err(ToolflowError::Config(format!(
                "unknown approval mode '{other}'"
            ))),
        }
    }
}

/// Session approval policy consulted once per call while validating.
///
/// The mode is configuration. The only mutation driven by the scheduler is
/// [`elevate_trust`](Self::elevate_trust), applied on `proceed_always`.
#[derive(Default)]
pub struct ApprovalPolicy {
    /// Current approval mode.
    mode: RwLock<ApprovalMode>,
    /// Tools trusted for the rest of the session.
    trusted: DashSet<String>,
}

impl ApprovalPolicy {
    /// Creates a policy with the given mode.
    #[must_use]
    pub fn new(mode: ApprovalMode) -> Self {
        Self {
            mode: RwLock::new(mode),
            trusted: DashSet::new(),
        }
    }

    /// Pre-trusts a set of tools.
    #[must_use]
    pub fn with_trusted_tools<I, S>(self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tool in tools {
            self.trusted.insert(tool.into());
        }
        self
    }

    /// Returns the current mode.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        *self.mode.read()
    }

    /// Switches the mode.
    pub fn set_mode(&self, mode: ApprovalMode) {
        *self.mode.write() = mode;
    }

    /// Trusts a tool so later calls to it auto-approve.
    pub fn elevate_trust(&self, tool_name: &str) {
        if self.trusted.insert(tool_name.to_string()) {
            info!(tool = %tool_name, "Elevated trust for tool");
        }
    }

    /// Withdraws trust from a tool.
    pub fn revoke_trust(&self, tool_name: &str) -> bool {
        self.trusted.remove(tool_name).is_some()
    }

    /// Returns whether a tool is trusted for the session.
    #[must_use]
    pub fn is_trusted(&self, tool_name: &str) -> bool {
        self.trusted.contains(tool_name)
    }

    /// Lists trusted tools, sorted.
    #[must_use]
    pub fn trusted_tools(&self) -> Vec<String> {
        let mut tools: Vec<String> = self.trusted.iter().map(|t| t.key().clone()).collect();
        tools.sort();
        tools
    }

    /// Decides whether a call to this tool needs confirmation.
    #[must_use]
    pub fn requires_confirmation(&self, definition: &ToolDefinition) -> bool {
        if self.is_trusted(&definition.name) {
            return false;
        }

        match self.mode() {
            ApprovalMode::Yolo => false,
            ApprovalMode::AutoEdit if definition.kind.is_edit() => false,
            ApprovalMode::AutoEdit | ApprovalMode::Default => definition.requires_approval,
        }
    }
}

impl fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalPolicy")
            .field("mode", &self.mode())
            .field("trusted", &self.trusted_tools())
            .finish()
    }
}
