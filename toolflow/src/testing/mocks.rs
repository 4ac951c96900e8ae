//! Mock tools for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::core::ConfirmationCallback;
use crate::errors::ToolError;
use crate::tools::{Tool, ToolDefinition, ToolInvocation, ToolKind, ToolOutput};

/// A tool that records its arguments and echoes them back.
pub struct MockTool {
    definition: ToolDefinition,
    delay: Option<Duration>,
    on_confirm: Option<ConfirmationCallback>,
    calls: Mutex<Vec<serde_json::Value>>,
}

impl MockTool {
    /// Creates a mock tool that runs without approval.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            definition: ToolDefinition::new(name, kind),
            delay: None,
            on_confirm: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Marks the tool as requiring approval.
    #[must_use]
    pub fn requiring_approval(mut self) -> Self {
        self.definition = self.definition.requires_approval();
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.definition = self.definition.with_input_schema(schema);
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the continuation run when a confirmation resolves.
    #[must_use]
    pub fn with_on_confirm(mut self, callback: ConfirmationCallback) -> Self {
        self.on_confirm = Some(callback);
        self
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the arguments of each execution.
    #[must_use]
    pub fn recorded_args(&self) -> Vec<serde_json::Value> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn on_confirm(&self) -> Option<ConfirmationCallback> {
        self.on_confirm.clone()
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().push(invocation.args.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ToolOutput::ok(Some(invocation.args)))
    }
}

/// A tool that streams fixed chunks, then succeeds with their concatenation.
pub struct StreamingTool {
    definition: ToolDefinition,
    chunks: Vec<String>,
}

impl StreamingTool {
    /// Creates a streaming tool.
    #[must_use]
    pub fn new(name: impl Into<String>, chunks: Vec<&str>) -> Self {
        Self {
            definition: ToolDefinition::new(name, ToolKind::Execute),
            chunks: chunks.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl Tool for StreamingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        for chunk in &self.chunks {
            invocation.output.send(chunk.clone());
            tokio::task::yield_now().await;
        }
        Ok(ToolOutput::text(self.chunks.concat()))
    }
}

/// A tool that always fails.
pub struct FailingTool {
    definition: ToolDefinition,
    error: String,
    soft: bool,
}

impl FailingTool {
    /// Creates a tool that returns an execution error.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition::new(name, ToolKind::Execute),
            error: error.into(),
            soft: false,
        }
    }

    /// Creates a tool that returns an unsuccessful output instead of an error.
    #[must_use]
    pub fn soft(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            soft: true,
            ..Self::new(name, error)
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        if self.soft {
            Ok(ToolOutput::fail(self.error.clone()))
        } else {
            Err(ToolError::execution_failure(self.name(), self.error.clone()))
        }
    }
}

/// A tool that runs until released or cancelled.
pub struct BlockingTool {
    definition: ToolDefinition,
    gate: Arc<CancellationToken>,
    started: AtomicUsize,
    last_token: Mutex<Option<Arc<CancellationToken>>>,
}

impl BlockingTool {
    /// Creates a blocking tool.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition::new(name, ToolKind::Execute),
            gate: CancellationToken::shared(),
            started: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        }
    }

    /// Marks the tool as requiring approval.
    #[must_use]
    pub fn requiring_approval(mut self) -> Self {
        self.definition = self.definition.requires_approval();
        self
    }

    /// Lets every current and future execution finish successfully.
    pub fn release(&self) {
        self.gate.cancel("released");
    }

    /// Returns the number of executions that started.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns the cancellation token handed to the latest execution.
    #[must_use]
    pub fn last_invocation_token(&self) -> Option<Arc<CancellationToken>> {
        self.last_token.lock().clone()
    }
}

#[async_trait]
impl Tool for BlockingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock() = Some(Arc::clone(&invocation.cancel));
        tokio::select! {
            () = self.gate.cancelled() => Ok(ToolOutput::text("released")),
            () = invocation.cancel.cancelled() => {
                Err(ToolError::execution_failure(self.name(), "observed cancellation"))
            }
        }
    }
}

/// A tool that panics when executed.
pub struct PanickingTool {
    definition: ToolDefinition,
    message: String,
}

impl PanickingTool {
    /// Creates a tool that panics with `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition::new(name, ToolKind::Execute),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for PanickingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        panic!("{}", self.message);
    }
}
