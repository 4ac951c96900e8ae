//! Typed notifications published by the scheduler.

use crate::core::{BatchId, ToolCall};

/// One scheduler notification.
///
/// Every variant carries a full snapshot of the batch, in batch order.
#[derive(Debug, Clone)]
pub enum SchedulerUpdate {
    /// A call changed status, or a pending call was republished.
    CallsUpdated {
        /// The batch.
        batch_id: BatchId,
        /// Snapshot after the change.
        calls: Vec<ToolCall>,
    },
    /// An executing call produced output.
    OutputChunk {
        /// The batch.
        batch_id: BatchId,
        /// The producing call.
        call_id: String,
        /// The chunk text.
        chunk: String,
        /// Snapshot after appending the chunk.
        calls: Vec<ToolCall>,
    },
    /// Every call in the batch is terminal. Sent exactly once per batch.
    BatchComplete {
        /// The batch.
        batch_id: BatchId,
        /// The terminal calls.
        calls: Vec<ToolCall>,
    },
}

impl SchedulerUpdate {
    /// Returns the batch this update belongs to.
    #[must_use]
    pub fn batch_id(&self) -> BatchId {
        match self {
            Self::CallsUpdated { batch_id, .. }
            | Self::OutputChunk { batch_id, .. }
            | Self::BatchComplete { batch_id, .. } => *batch_id,
        }
    }

    /// Returns the snapshot carried by this update.
    #[must_use]
    pub fn calls(&self) -> &[ToolCall] {
        match self {
            Self::CallsUpdated { calls, .. }
            | Self::OutputChunk { calls, .. }
            | Self::BatchComplete { calls, .. } => calls,
        }
    }

    /// Returns a short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallsUpdated { .. } => "calls_updated",
            Self::OutputChunk { .. } => "output_chunk",
            Self::BatchComplete { .. } => "batch_complete",
        }
    }
}
