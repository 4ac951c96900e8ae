//! Tool trait and the registry that resolves tool names.

use super::{ToolDefinition, ToolInvocation, ToolOutput};
use crate::core::ConfirmationCallback;
use crate::errors::ToolError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for tool implementations.
///
/// The scheduler calls every hook without holding its state lock, so hooks
/// may call back into the scheduler.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> &ToolDefinition;

    /// Returns the tool's name.
    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Tool-specific argument validation, run after the shape check.
    fn validate_args(&self, _args: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }

    /// Describes what this invocation will do, for confirmation prompts.
    fn describe(&self, args: &serde_json::Value) -> String {
        format!("{} {}", self.name(), args)
    }

    /// Continuation run when a pending confirmation for this tool resolves.
    fn on_confirm(&self) -> Option<ConfirmationCallback> {
        None
    }

    /// Runs the tool.
    ///
    /// Cooperative tools should watch `invocation.cancel`.
    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Registry for tool instances.
#[derive(Default)]
pub struct ToolRegistry {
    /// Registered tools keyed by name.
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().insert(name, tool);
    }

    /// Registers a tool, builder style.
    #[must_use]
    pub fn with_tool(self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Resolves a tool by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.get(name).ok_or_else(|| ToolError::unknown_tool(name))
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Checks if a tool is registered.
    #[must_use]
    pub fn can_execute(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Lists registered tool names, sorted.
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the definitions of every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .values()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Removes a tool, returning it if present.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.write().remove(name)
    }

    /// Clears all registered tools.
    pub fn clear(&self) {
        self.tools.write().clear();
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolKind;

    struct TestTool {
        definition: ToolDefinition,
    }

    impl TestTool {
        fn new(name: &str) -> Arc<dyn Tool> {
            Arc::new(Self {
                definition: ToolDefinition::new(name, ToolKind::Read),
            })
        }
    }

    #[async_trait]
    impl Tool for TestTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::ok(Some(invocation.args)))
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.list_tools().is_empty());
    }

    #[test]
    fn test_registry_register() {
        let registry = ToolRegistry::new().with_tool(TestTool::new("list_dir"));

        assert!(registry.can_execute("list_dir"));
        assert!(!registry.can_execute("unknown"));
        assert_eq!(registry.definitions().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("nope").err().unwrap();

        assert_eq!(err, ToolError::unknown_tool("nope"));
    }

    #[test]
    fn test_list_is_sorted_and_unregister() {
        let registry = ToolRegistry::new();
        registry.register(TestTool::new("b"));
        registry.register(TestTool::new("a"));

        assert_eq!(registry.list_tools(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unregister("a").is_some());
        assert!(!registry.can_execute("a"));

        registry.clear();
        assert!(registry.list_tools().is_empty());
    }

    #[tokio::test]
    async fn test_default_trait_methods() {
        let tool = TestTool::new("echo");
        let args = serde_json::json!({"x": 1});

        assert_eq!(tool.name(), "echo");
        assert!(tool.validate_args(&args).is_ok());
        assert_eq!(tool.describe(&args), r#"echo {"x":1}"#);
        assert!(tool.on_confirm().is_none());

        let output = tool
            .execute(ToolInvocation::detached("c", args.clone()))
            .await
            .unwrap();
        assert_eq!(output.data, Some(args));
    }
}
