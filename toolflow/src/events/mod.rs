//! Output channels for outward tool events.
//!
//! The orchestrator writes every outward event to exactly one current
//! [`OutputChannel`]. This module provides the trait and the in-process
//! implementations used for logging, embedding and transport streaming.

mod sink;
mod streaming;

#[cfg(test)]
pub use sink::MockOutputChannel;
pub use sink::{CollectingChannel, LoggingChannel, NoOpChannel, OutputChannel};
pub use streaming::{DropCallback, StreamMetrics, StreamingChannel};
