//! Tools subsystem.
//!
//! This module provides:
//! - Tool definitions, kinds and I/O types
//! - The `Tool` trait and registry
//! - The session approval policy
//! - Parsing of provider-formatted tool calls

mod approval;
mod definitions;
mod parse;
mod registry;

pub use approval::{ApprovalMode, ApprovalPolicy};
pub use definitions::{OutputChunkSink, ToolDefinition, ToolInvocation, ToolKind, ToolOutput};
pub use parse::{parse_tool_calls, CallFormat, UnresolvedToolCall};
pub use registry::{Tool, ToolRegistry};
