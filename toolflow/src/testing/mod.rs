//! Testing utilities for toolflow.
//!
//! This module provides:
//! - Mock tools that echo, stream, fail, block or panic
//! - Assertions over event order and terminal calls
//! - An orchestrator test harness

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_event_order, assert_started_first, assert_terminal};
pub use fixtures::TestHarness;
pub use mocks::{BlockingTool, FailingTool, MockTool, PanickingTool, StreamingTool};
