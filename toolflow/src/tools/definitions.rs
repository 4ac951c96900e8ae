//! Tool definitions and I/O types.

use crate::cancellation::CancellationToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Broad category of what a tool does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Reads files or state.
    Read,
    /// Edits files.
    Edit,
    /// Deletes files.
    Delete,
    /// Moves or renames files.
    Move,
    /// Searches content.
    Search,
    /// Runs commands.
    Execute,
    /// Internal reasoning helpers.
    Think,
    /// Fetches remote content.
    Fetch,
    /// Anything else.
    Other,
}

impl Default for ToolKind {
    fn default() -> Self {
        Self::Other
    }
}

impl ToolKind {
    /// Returns true for edit-type tools, auto-approved under `AUTO_EDIT`.
    #[must_use]
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edit | Self::Delete | Self::Move)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Search => "search",
            Self::Execute => "execute",
            Self::Think => "think",
            Self::Fetch => "fetch",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Definition of a tool that can be executed.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// The tool name.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// The tool kind.
    pub kind: ToolKind,
    /// JSON Schema for input shape checks.
    pub input_schema: serde_json::Value,
    /// Whether approval is required under the default approval mode.
    pub requires_approval: bool,
    /// Custom approval prompt title.
    pub approval_message: Option<String>,
}

impl ToolDefinition {
    /// Creates a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            input_schema: serde_json::json!({}),
            requires_approval: false,
            approval_message: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Marks the tool as requiring approval.
    #[must_use]
    pub fn requires_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Marks the tool as requiring approval with a custom prompt title.
    #[must_use]
    pub fn requires_approval_with_message(mut self, message: impl Into<String>) -> Self {
        self.requires_approval = true;
        self.approval_message = Some(message.into());
        self
    }

    /// Returns the keys listed as `required` in the input schema.
    #[must_use]
    pub fn required_args(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(serde_json::Value::as_array)
            .map(|keys| keys.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Checks the basic shape of `args`.
    ///
    /// Arguments must be a JSON object containing every required key.
    pub fn check_args_shape(&self, args: &serde_json::Value) -> Result<(), String> {
        let Some(obj) = args.as_object() else {
            return Err(format!("expected an object, got {}", json_type_name(args)));
        };

        let missing: Vec<&str> = self
            .required_args()
            .into_iter()
            .filter(|key| !obj.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required argument(s): {}", missing.join(", ")))
        }
    }

    /// Returns the prompt title used when confirmation is needed.
    #[must_use]
    pub fn approval_title(&self) -> String {
        self.approval_message
            .clone()
            .unwrap_or_else(|| format!("Confirm {}", self.name))
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Output from a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Whether the execution succeeded.
    pub success: bool,
    /// The output data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    /// Creates a successful output.
    #[must_use]
    pub fn ok(data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Creates a successful output carrying plain text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok(Some(serde_json::Value::String(text.into())))
    }

    /// Creates a failure output.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("success".to_string(), serde_json::json!(self.success));

        if let Some(ref data) = self.data {
            map.insert("data".to_string(), data.clone());
        }
        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }

        map
    }
}

/// Sink a running tool pushes incremental output into.
#[derive(Clone)]
pub struct OutputChunkSink {
    forward: Arc<dyn Fn(String) + Send + Sync>,
}

impl OutputChunkSink {
    /// Creates a sink that forwards each chunk to `forward`.
    #[must_use]
    pub fn new<F>(forward: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        Self {
            forward: Arc::new(forward),
        }
    }

    /// Creates a sink that drops every chunk.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// Pushes one chunk.
    pub fn send(&self, chunk: impl Into<String>) {
        (self.forward)(chunk.into());
    }
}

impl fmt::Debug for OutputChunkSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputChunkSink").finish_non_exhaustive()
    }
}

/// Everything a tool receives when it runs.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// The call id.
    pub call_id: String,
    /// The (possibly edited) arguments.
    pub args: serde_json::Value,
    /// Where to push incremental output.
    pub output: OutputChunkSink,
    /// Raised when the batch or this call is cancelled.
    pub cancel: Arc<CancellationToken>,
}

impl ToolInvocation {
    /// Creates an invocation with a discarding sink and a fresh token.
    #[must_use]
    pub fn detached(call_id: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            args,
            output: OutputChunkSink::discard(),
            cancel: CancellationToken::shared(),
        }
    }

    /// Parses the arguments into a typed struct.
    pub fn parse_args<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.args.clone()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_tool_definition_creation() {
        let def = ToolDefinition::new("list_dir", ToolKind::Read).with_description("Lists a directory");

        assert_eq!(def.name, "list_dir");
        assert_eq!(def.kind, ToolKind::Read);
        assert!(!def.requires_approval);
        assert_eq!(def.approval_title(), "Confirm list_dir");
    }

    #[test]
    fn test_requires_approval_with_message() {
        let def = ToolDefinition::new("exec", ToolKind::Execute)
            .requires_approval_with_message("Run shell command");

        assert!(def.requires_approval);
        assert_eq!(def.approval_title(), "Run shell command");
    }

    #[test]
    fn test_edit_kinds() {
        assert!(ToolKind::Edit.is_edit());
        assert!(ToolKind::Delete.is_edit());
        assert!(ToolKind::Move.is_edit());
        assert!(!ToolKind::Execute.is_edit());
        assert!(!ToolKind::Read.is_edit());
    }

    #[test]
    fn test_args_shape_requires_object() {
        let def = ToolDefinition::new("t", ToolKind::Other);

        assert!(def.check_args_shape(&serde_json::json!({})).is_ok());
        let err = def.check_args_shape(&serde_json::json!([1, 2])).unwrap_err();
        assert!(err.contains("array"));
    }

    #[test]
    fn test_args_shape_required_keys() {
        let def = ToolDefinition::new("exec", ToolKind::Execute).with_input_schema(serde_json::json!({
            "type": "object",
            "required": ["command", "cwd"]
        }));

        assert_eq!(def.required_args(), vec!["command", "cwd"]);
        assert!(def
            .check_args_shape(&serde_json::json!({"command": "ls", "cwd": "/"}))
            .is_ok());

        let err = def
            .check_args_shape(&serde_json::json!({"command": "ls"}))
            .unwrap_err();
        assert_eq!(err, "missing required argument(s): cwd");
    }

    #[test]
    fn test_tool_output_ok_and_fail() {
        let output = ToolOutput::text("done");
        assert!(output.success);
        assert_eq!(output.data, Some(serde_json::json!("done")));

        let failed = ToolOutput::fail("Something went wrong");
        assert!(!failed.success);
        assert_eq!(failed.error, Some("Something went wrong".to_string()));

        let dict = failed.to_dict();
        assert_eq!(dict.get("success"), Some(&serde_json::json!(false)));
        assert!(!dict.contains_key("data"));
    }

    #[test]
    fn test_output_chunk_sink_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = OutputChunkSink::new(move |chunk| seen_clone.lock().push(chunk));

        sink.send("a");
        sink.send(String::from("b"));

        assert_eq!(*seen.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_invocation_parse_args() {
        #[derive(serde::Deserialize)]
        struct Args {
            command: String,
        }

        let inv = ToolInvocation::detached("c1", serde_json::json!({"command": "ls"}));
        let args: Args = inv.parse_args().unwrap();
        assert_eq!(args.command, "ls");

        let bad = ToolInvocation::detached("c2", serde_json::json!({}));
        assert!(bad.parse_args::<Args>().is_err());
    }
}
