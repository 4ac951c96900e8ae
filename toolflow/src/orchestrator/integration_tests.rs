//! End-to-end orchestrator tests over a collecting channel.

#[cfg(test)]
mod tests {
    use crate::core::{ConfirmationOutcome, ToolCallRequest, ToolCallStatus};
    use crate::errors::OrchestrationError;
    use crate::events::CollectingChannel;
    use crate::testing::{
        assert_event_order, assert_started_first, assert_terminal, BlockingTool, MockTool,
        StreamingTool, TestHarness,
    };
    use crate::tools::{ApprovalMode, ApprovalPolicy, Tool, ToolKind};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn harness() -> TestHarness {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(MockTool::new("list_dir", ToolKind::Read)),
            Arc::new(MockTool::new("exec", ToolKind::Execute).requiring_approval()),
            Arc::new(StreamingTool::new("stream", vec!["one", "two"])),
        ];
        TestHarness::new(ApprovalPolicy::new(ApprovalMode::Default), tools)
    }

    fn req(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest::with_call_id(id, name, serde_json::json!({}))
    }

    async fn wait_for_status(h: &TestHarness, call_id: &str, status: ToolCallStatus) {
        let poll = async {
            while h.orchestrator.get_call(call_id).map(|c| c.status) != Some(status) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(WAIT, poll)
            .await
            .expect("call should reach status");
    }

    /// Schedules `[a: list_dir, b: exec]` and waits until `a` has succeeded
    /// and `b` is pending.
    async fn mixed_batch(h: &TestHarness) {
        h.schedule(vec![req("a", "list_dir"), req("b", "exec")])
            .unwrap();
        assert!(h.wait_for_confirmation("b", WAIT).await);
        wait_for_status(h, "a", ToolCallStatus::Success).await;
    }

    #[tokio::test]
    async fn test_mixed_batch_waits_for_confirmation() {
        let h = harness();
        mixed_batch(&h).await;

        let events = h.channel.events();
        assert_eq!(events[0].event_type(), "tool.started");
        assert_eq!(events[0].call_id(), Some("a"));
        assert_eq!(events[1].event_type(), "tool.started");
        assert_eq!(events[1].call_id(), Some("b"));
        assert!(h.channel.events_of_type("tool.result").is_empty());
        assert!(h.completions().is_empty());
        assert!(h.orchestrator.has_channel());

        h.orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ProceedOnce, None)
            .unwrap();
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();

        assert_terminal(&calls[0], ToolCallStatus::Success);
        assert_terminal(&calls[1], ToolCallStatus::Success);
        let events = h.channel.events();
        assert_started_first(&events);
        assert_event_order(
            &events,
            "a",
            &["tool.started", "tool.progress", "tool.result"],
        );
        assert_event_order(
            &events,
            "b",
            &[
                "tool.started",
                "tool.confirmation_request",
                "tool.progress",
                "tool.result",
            ],
        );
        assert_eq!(
            events.last().map(crate::core::ToolEvent::event_type),
            Some("batch.complete")
        );
        assert!(!h.orchestrator.has_channel());
    }

    #[tokio::test]
    async fn test_cancel_all_while_awaiting() {
        let h = harness();
        mixed_batch(&h).await;

        assert_eq!(h.orchestrator.cancel_all(), 1);
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();

        assert_terminal(&calls[0], ToolCallStatus::Success);
        assert_terminal(&calls[1], ToolCallStatus::Cancelled);
        assert_event_order(
            &h.channel.events(),
            "b",
            &[
                "tool.started",
                "tool.confirmation_request",
                "tool.progress",
                "tool.result",
            ],
        );
        assert!(!h.orchestrator.has_channel());
        assert!(h.orchestrator.active_batch_id().is_none());
    }

    #[tokio::test]
    async fn test_proceed_always_skips_later_confirmations() {
        let h = harness();
        mixed_batch(&h).await;

        h.orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ProceedAlways, None)
            .unwrap();
        h.wait_for_completion(1, WAIT).await.unwrap();
        assert!(h.orchestrator.policy().is_trusted("exec"));

        h.channel.clear();
        h.schedule(vec![req("c", "exec")]).unwrap();
        let calls = h.wait_for_completion(2, WAIT).await.unwrap();

        assert_terminal(&calls[0], ToolCallStatus::Success);
        assert_event_order(
            &h.channel.events(),
            "c",
            &["tool.started", "tool.progress", "tool.result"],
        );
        assert!(h.channel.events_of_type("tool.confirmation_request").is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_request_not_repeated() {
        let h = harness();
        mixed_batch(&h).await;

        h.orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ModifyWithEditor, None)
            .unwrap();
        h.orchestrator
            .modify_tool_call_args("b", serde_json::json!({"command": "ls"}))
            .unwrap();
        h.orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ProceedOnce, None)
            .unwrap();
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();

        assert_eq!(h.channel.events_of_type("tool.confirmation_request").len(), 1);
        assert_eq!(calls[1].request.args, serde_json::json!({"command": "ls"}));
    }

    #[tokio::test]
    async fn test_confirm_unknown_id_is_not_found() {
        let h = harness();
        mixed_batch(&h).await;
        let before = h.channel.len();

        let err = h
            .orchestrator
            .confirm_tool_call("missing", ConfirmationOutcome::ProceedOnce, None)
            .unwrap_err();

        assert_eq!(err, OrchestrationError::not_found("missing"));
        assert_eq!(h.orchestrator.pending_confirmations().len(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.channel.len(), before);
    }

    #[tokio::test]
    async fn test_confirming_twice_is_invalid_state() {
        let h = harness();
        h.schedule(vec![req("b", "exec"), req("c", "exec")]).unwrap();
        assert!(h.wait_for_confirmation("c", WAIT).await);

        h.orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ProceedOnce, None)
            .unwrap();
        let err = h
            .orchestrator
            .confirm_tool_call("b", ConfirmationOutcome::ProceedOnce, None)
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_STATE");
        h.orchestrator.cancel_all();
    }

    #[tokio::test]
    async fn test_raw_outcome_parsing() {
        let h = harness();
        mixed_batch(&h).await;

        let err = h
            .orchestrator
            .confirm_tool_call_raw("b", "maybe", None)
            .unwrap_err();
        assert_eq!(err, OrchestrationError::invalid_argument("maybe"));
        assert_eq!(
            h.orchestrator.get_call("b").map(|c| c.status),
            Some(ToolCallStatus::AwaitingApproval)
        );

        h.orchestrator
            .confirm_tool_call_raw("b", "cancel", None)
            .unwrap();
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();
        assert_terminal(&calls[1], ToolCallStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_streamed_output_becomes_progress() {
        let h = harness();
        h.schedule(vec![req("s", "stream")]).unwrap();
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();

        assert_terminal(&calls[0], ToolCallStatus::Success);
        assert_event_order(
            &h.channel.events(),
            "s",
            &[
                "tool.started",
                "tool.progress",
                "tool.progress",
                "tool.progress",
                "tool.result",
            ],
        );
        assert_eq!(calls[0].output_text(), "onetwo");
    }

    #[tokio::test]
    async fn test_batch_signal_cancels_running_call() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(BlockingTool::new("block"))];
        let h = TestHarness::new(ApprovalPolicy::default(), tools);
        h.schedule(vec![req("x", "block")]).unwrap();
        wait_for_status(&h, "x", ToolCallStatus::Executing).await;

        h.signal.cancel("shutdown");
        let calls = h.wait_for_completion(1, WAIT).await.unwrap();

        assert_terminal(&calls[0], ToolCallStatus::Cancelled);
        assert!(matches!(
            calls[0].result,
            Some(crate::core::ToolCallResult::Cancelled { ref reason }) if reason == "shutdown"
        ));
    }

    #[tokio::test]
    async fn test_uninitialized_orchestrator_binds_nothing() {
        let orchestrator =
            crate::orchestrator::ToolCallOrchestrator::new(ApprovalPolicy::default());
        let channel = Arc::new(CollectingChannel::new());

        let err = orchestrator
            .schedule_batch(
                vec![req("a", "list_dir")],
                &crate::cancellation::CancellationToken::shared(),
                channel.clone(),
            )
            .unwrap_err();

        assert_eq!(err, OrchestrationError::NotInitialized);
        assert!(channel.is_empty());
        assert!(!orchestrator.has_channel());
    }

    #[tokio::test]
    async fn test_busy_while_batch_live() {
        let h = harness();
        mixed_batch(&h).await;

        let err = h.schedule(vec![req("z", "list_dir")]).unwrap_err();
        assert_eq!(err.code(), "BUSY");
        assert!(h.orchestrator.has_channel());
        h.orchestrator.cancel_all();
    }

    #[tokio::test]
    async fn test_from_config_uses_cancel_reason() {
        let config = crate::config::ToolflowConfig {
            cancel_reason: "session closed".to_string(),
            ..crate::config::ToolflowConfig::default()
        };
        let registry = Arc::new(crate::tools::ToolRegistry::new());
        registry.register(Arc::new(
            MockTool::new("exec", ToolKind::Execute).requiring_approval(),
        ));
        let orchestrator = crate::orchestrator::ToolCallOrchestrator::from_config(&config, registry);
        let channel = Arc::new(CollectingChannel::new());

        orchestrator
            .schedule_batch(
                vec![req("b", "exec")],
                &crate::cancellation::CancellationToken::shared(),
                channel.clone(),
            )
            .unwrap();
        assert_eq!(orchestrator.cancel_all(), 1);
        assert!(
            channel
                .wait_for(
                    |events| events.iter().any(|e| e.event_type() == "batch.complete"),
                    WAIT
                )
                .await
        );

        let result = channel.events_of_type("tool.result");
        let json = result[0].to_json();
        assert_eq!(json["result"]["detail"]["reason"], "session closed");
    }
}
