//! Assertions over collected events and terminal calls.

use crate::core::{ToolCall, ToolCallStatus, ToolEvent};

/// Asserts that the events for `call_id` have exactly the given dotted types,
/// in order.
pub fn assert_event_order(events: &[ToolEvent], call_id: &str, expected: &[&str]) {
    let actual: Vec<&str> = events
        .iter()
        .filter(|e| e.call_id() == Some(call_id))
        .map(ToolEvent::event_type)
        .collect();
    assert_eq!(
        actual, expected,
        "Unexpected event order for call '{call_id}'"
    );
}

/// Asserts that every call's `tool.started` event precedes its other events.
pub fn assert_started_first(events: &[ToolEvent]) {
    let mut started = std::collections::HashSet::new();
    for event in events {
        let Some(call_id) = event.call_id() else {
            continue;
        };
        if event.event_type() == "tool.started" {
            started.insert(call_id);
        } else {
            assert!(
                started.contains(call_id),
                "Event {} for call '{}' arrived before its started event",
                event.event_type(),
                call_id
            );
        }
    }
}

/// Asserts that `call` ended in `expected` with a matching result.
pub fn assert_terminal(call: &ToolCall, expected: ToolCallStatus) {
    assert!(
        expected.is_terminal(),
        "Expected status {expected:?} is not terminal"
    );
    assert_eq!(
        call.status,
        expected,
        "Call '{}' ended in {:?}, expected {:?}",
        call.call_id(),
        call.status,
        expected
    );
    let result_status = call.result.as_ref().map(crate::core::ToolCallResult::status);
    assert_eq!(
        result_status,
        Some(expected),
        "Call '{}' result does not match its status",
        call.call_id()
    );
    assert!(
        call.confirmation_details.is_none(),
        "Terminal call '{}' still carries confirmation details",
        call.call_id()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ToolCallRequest, ToolCallResult};
    use crate::tools::ToolOutput;

    #[test]
    fn test_event_order_and_started_first() {
        let req = ToolCallRequest::with_call_id("a", "t", serde_json::json!({}));
        let mut call = ToolCall::new(req.clone());
        call.status = ToolCallStatus::Success;
        call.result = Some(ToolCallResult::Success(ToolOutput::ok(None)));
        let events = vec![ToolEvent::started(&req), ToolEvent::result(&call)];

        assert_event_order(&events, "a", &["tool.started", "tool.result"]);
        assert_started_first(&events);
        assert_terminal(&call, ToolCallStatus::Success);
    }

    #[test]
    #[should_panic(expected = "before its started event")]
    fn test_result_before_started_panics() {
        let req = ToolCallRequest::with_call_id("a", "t", serde_json::json!({}));
        let call = ToolCall::new(req.clone());
        assert_started_first(&[ToolEvent::result(&call), ToolEvent::started(&req)]);
    }
}
