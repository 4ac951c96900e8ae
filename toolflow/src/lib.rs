//! # Toolflow
//!
//! Orchestration of model-requested tool calls.
//!
//! Toolflow takes a batch of tool invocation requests and drives each one
//! through validation, optional human approval, concurrent execution and
//! cancellation, while streaming progress to a single output channel:
//!
//! - **Scheduling**: [`ToolCallScheduler`](scheduler::ToolCallScheduler) owns
//!   the per-call state machine and publishes batch snapshots
//! - **Orchestration**: [`ToolCallOrchestrator`](orchestrator::ToolCallOrchestrator)
//!   turns snapshots into de-duplicated outward events
//! - **Approval**: an [`ApprovalPolicy`](tools::ApprovalPolicy) with
//!   session-wide trust elevation
//! - **Cancellation**: one shared token per batch, plus optional per-call
//!   signals
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use toolflow::prelude::*;
//!
//! let registry = Arc::new(ToolRegistry::new().with_tool(Arc::new(ListDir)));
//! let orchestrator = ToolCallOrchestrator::with_registry(registry, ApprovalPolicy::default());
//!
//! let channel = Arc::new(CollectingChannel::new());
//! let signal = CancellationToken::shared();
//! orchestrator.schedule_batch(requests, &signal, channel.clone())?;
//!
//! // Later, answer a confirmation-request event.
//! orchestrator.confirm_tool_call("call-2", ConfirmationOutcome::ProceedOnce, None)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod scheduler;
pub mod testing;
pub mod tools;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{LoggingConfig, ToolflowConfig};
    pub use crate::core::{
        BatchId, ConfirmationDetails, ConfirmationOutcome, ProgressKind, ToolCall,
        ToolCallRequest, ToolCallResult, ToolCallStatus, ToolEvent, ToolEventKind,
    };
    pub use crate::errors::{OrchestrationError, ToolError, ToolflowError};
    pub use crate::events::{
        CollectingChannel, LoggingChannel, NoOpChannel, OutputChannel, StreamingChannel,
    };
    pub use crate::observability::init_tracing;
    pub use crate::orchestrator::ToolCallOrchestrator;
    pub use crate::scheduler::{SchedulerUpdate, ToolCallScheduler};
    pub use crate::tools::{
        parse_tool_calls, ApprovalMode, ApprovalPolicy, CallFormat, Tool, ToolDefinition,
        ToolInvocation, ToolKind, ToolOutput, ToolRegistry,
    };
    pub use std::sync::Arc;
}
