//! Core domain model types for toolflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Call status and confirmation outcome enums
//! - Tool call requests, records and results
//! - Outward events

mod call;
mod event;
mod status;

pub use call::{
    ConfirmationCallback, ConfirmationDetails, ToolCall, ToolCallRequest, ToolCallResult,
};
pub use event::{ProgressKind, ToolEvent, ToolEventKind};
pub use status::{ConfirmationOutcome, ToolCallStatus};

/// Identifies one scheduled batch.
pub type BatchId = uuid::Uuid;
