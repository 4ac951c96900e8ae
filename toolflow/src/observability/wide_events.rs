//! Wide event emitter for batch-level observability.

use crate::core::{BatchId, ToolCall, ToolCallStatus};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Emitter for wide events (one comprehensive payload per batch).
pub struct WideEventEmitter {
    /// Event type for batch summaries.
    pub batch_event_type: String,
}

impl Default for WideEventEmitter {
    fn default() -> Self {
        Self {
            batch_event_type: "batch.summary".to_string(),
        }
    }
}

impl WideEventEmitter {
    /// Creates a new wide event emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a batch payload.
    #[must_use]
    pub fn build_batch_payload(
        batch_id: BatchId,
        calls: &[ToolCall],
        duration_ms: f64,
    ) -> serde_json::Value {
        let has_error = calls.iter().any(|c| c.status == ToolCallStatus::Error);
        let all_cancelled =
            !calls.is_empty() && calls.iter().all(|c| c.status == ToolCallStatus::Cancelled);
        let status = if has_error {
            "failed"
        } else if all_cancelled {
            "cancelled"
        } else {
            "completed"
        };

        let mut status_counts: BTreeMap<String, u32> = BTreeMap::new();
        for call in calls {
            *status_counts.entry(call.status.to_string()).or_insert(0) += 1;
        }

        let call_details: Vec<serde_json::Value> = calls
            .iter()
            .map(|call| {
                let mut detail = serde_json::json!({
                    "call_id": call.call_id(),
                    "tool": call.name(),
                    "status": call.status.to_string(),
                    "duration_ms": call.duration_ms,
                });
                if let Some(error) = call.result.as_ref().and_then(|r| r.error_message()) {
                    detail["error"] = serde_json::json!(error);
                }
                detail
            })
            .collect();

        serde_json::json!({
            "batch_id": batch_id.to_string(),
            "status": status,
            "total": calls.len(),
            "duration_ms": duration_ms,
            "status_counts": status_counts,
            "call_details": call_details,
        })
    }

    /// Logs a batch wide event.
    pub fn emit_batch_event(&self, batch_id: BatchId, calls: &[ToolCall], duration_ms: f64) {
        let payload = Self::build_batch_payload(batch_id, calls, duration_ms);

        if payload["status"] == "failed" {
            warn!(event_type = %self.batch_event_type, batch_id = %batch_id, payload = %payload, "Batch settled with errors");
        } else {
            info!(event_type = %self.batch_event_type, batch_id = %batch_id, payload = %payload, "Batch settled");
        }
    }
}
