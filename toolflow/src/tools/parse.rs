//! Parsing of provider-formatted tool calls into requests.

use crate::core::ToolCallRequest;
use crate::utils::generate_call_id;
use serde::Serialize;

/// Field layout of raw tool calls emitted by a model provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFormat {
    /// Field holding the call id.
    pub id_field: String,
    /// Optional wrapper object holding name and arguments.
    pub function_wrapper: Option<String>,
    /// Field holding the tool name.
    pub name_field: String,
    /// Field holding the arguments (object or JSON-encoded string).
    pub arguments_field: String,
}

impl Default for CallFormat {
    fn default() -> Self {
        Self::openai()
    }
}

impl CallFormat {
    /// `{id, function: {name, arguments}}`
    #[must_use]
    pub fn openai() -> Self {
        Self {
            id_field: "id".to_string(),
            function_wrapper: Some("function".to_string()),
            name_field: "name".to_string(),
            arguments_field: "arguments".to_string(),
        }
    }

    /// `{id, name, input}` with no wrapper.
    #[must_use]
    pub fn flat(arguments_field: impl Into<String>) -> Self {
        Self {
            id_field: "id".to_string(),
            function_wrapper: None,
            name_field: "name".to_string(),
            arguments_field: arguments_field.into(),
        }
    }
}

/// A raw call that could not be turned into a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedToolCall {
    /// The call id if available.
    pub id: Option<String>,
    /// The tool name if available.
    pub name: Option<String>,
    /// What was wrong.
    pub error: String,
    /// The original raw call.
    pub raw: serde_json::Value,
}

/// Parses raw provider calls, one result per input in order.
///
/// Tool names are not checked against a registry; unknown tools surface as
/// per-call errors once scheduled.
#[must_use]
pub fn parse_tool_calls(
    raw: &[serde_json::Value],
    format: &CallFormat,
) -> Vec<Result<ToolCallRequest, UnresolvedToolCall>> {
    raw.iter().map(|call| parse_one(call, format)).collect()
}

fn parse_one(
    call: &serde_json::Value,
    format: &CallFormat,
) -> Result<ToolCallRequest, UnresolvedToolCall> {
    let id = call
        .get(&format.id_field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let unresolved = |name: Option<String>, error: &str| UnresolvedToolCall {
        id: id.clone(),
        name,
        error: error.to_string(),
        raw: call.clone(),
    };

    let func_obj = match &format.function_wrapper {
        Some(wrapper) => call
            .get(wrapper)
            .ok_or_else(|| unresolved(None, "Missing function wrapper"))?,
        None => call,
    };

    let Some(name) = func_obj
        .get(&format.name_field)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
    else {
        return Err(unresolved(None, "Missing tool name"));
    };

    let args = match func_obj.get(&format.arguments_field) {
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => serde_json::json!({}),
        Some(serde_json::Value::String(s)) => serde_json::from_str(s)
            .map_err(|_| unresolved(Some(name.clone()), "Invalid JSON in arguments"))?,
        Some(serde_json::Value::Null) | None => serde_json::json!({}),
        Some(other) => other.clone(),
    };

    Ok(ToolCallRequest {
        call_id: id.clone().unwrap_or_else(generate_call_id),
        name,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_openai_string_arguments() {
        let raw = vec![json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "exec", "arguments": "{\"command\": \"ls\"}"}
        })];

        let parsed = parse_tool_calls(&raw, &CallFormat::default());
        let request = parsed[0].as_ref().unwrap();

        assert_eq!(request.call_id, "call_1");
        assert_eq!(request.name, "exec");
        assert_eq!(request.args, json!({"command": "ls"}));
    }

    #[test]
    fn test_parse_generates_missing_id() {
        let raw = vec![json!({"function": {"name": "list_dir", "arguments": ""}})];

        let request = parse_tool_calls(&raw, &CallFormat::openai())
            .remove(0)
            .unwrap();

        assert!(request.call_id.starts_with("call_"));
        assert_eq!(request.args, json!({}));
    }

    #[test]
    fn test_parse_flat_object_arguments() {
        let raw = vec![json!({"id": "t1", "name": "read", "input": {"path": "a.txt"}})];

        let request = parse_tool_calls(&raw, &CallFormat::flat("input"))
            .remove(0)
            .unwrap();

        assert_eq!(request.args, json!({"path": "a.txt"}));
    }

    #[test]
    fn test_parse_reports_unresolved() {
        let raw = vec![
            json!({"id": "x"}),
            json!({"id": "y", "function": {}}),
            json!({"id": "z", "function": {"name": "exec", "arguments": "{not json"}}),
        ];

        let parsed = parse_tool_calls(&raw, &CallFormat::openai());
        let errors: Vec<_> = parsed.into_iter().map(|r| r.unwrap_err()).collect();

        assert_eq!(errors[0].error, "Missing function wrapper");
        assert_eq!(errors[1].error, "Missing tool name");
        assert_eq!(errors[2].error, "Invalid JSON in arguments");
        assert_eq!(errors[2].name.as_deref(), Some("exec"));
        assert_eq!(errors[2].id.as_deref(), Some("z"));
    }

    #[test]
    fn test_non_object_arguments_pass_through() {
        let raw = vec![json!({"id": "a", "function": {"name": "t", "arguments": "[1, 2]"}})];

        let request = parse_tool_calls(&raw, &CallFormat::openai())
            .remove(0)
            .unwrap();

        assert_eq!(request.args, json!([1, 2]));
    }
}
