use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a tool exposed to the agent layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name, e.g. "exec_command", "write_stdin".
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: Value,
    /// Whether this tool has side-effects (write vs read).
    #[serde(default)]
    pub is_mutating: bool,
}

/// A request from the agent layer to call a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Optional structured data returned alongside the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    /// A successful result carrying structured data; `content` is its JSON text.
    pub fn success(tool_call_id: impl Into<String>, data: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: data.to_string(),
            is_error: false,
            data: Some(data),
        }
    }

    /// A failed result the execution unit may retry or explain.
    pub fn failure(tool_call_id: impl Into<String>, data: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: data.to_string(),
            is_error: true,
            data: Some(data),
        }
    }
}

/// Trait implemented by anything that can execute tool calls.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// List all tools this executor provides.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a single tool call and return the result.
    async fn execute(&self, call: &ToolCall) -> crate::Result<ToolResult>;
}
