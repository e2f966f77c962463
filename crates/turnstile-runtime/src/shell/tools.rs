//! Shell tools exposed to the execution unit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;
use turnstile_core::{Tool, ToolCall, ToolExecutor, ToolResult, TurnstileError};

use super::manager::{CloseShellParams, ExecCommandParams, ShellSessionManager, WriteStdinParams};

pub const EXEC_COMMAND: &str = "exec_command";
pub const WRITE_STDIN: &str = "write_stdin";
pub const CLOSE_SHELL: &str = "close_shell";

/// [`ToolExecutor`] over a [`ShellSessionManager`]. Shell failures come back
/// as `is_error` results so one bad call never fails the whole turn.
#[derive(Clone)]
pub struct ShellTools {
    manager: ShellSessionManager,
}

impl ShellTools {
    pub fn new(manager: ShellSessionManager) -> Self {
        Self { manager }
    }

    pub fn handles(tool_name: &str) -> bool {
        matches!(tool_name, EXEC_COMMAND | WRITE_STDIN | CLOSE_SHELL)
    }
}

fn parse<T: DeserializeOwned>(call: &ToolCall) -> turnstile_core::Result<T> {
    serde_json::from_value(call.arguments.clone()).map_err(|e| {
        TurnstileError::InvalidToolArguments {
            tool: call.tool_name.clone(),
            reason: e.to_string(),
        }
    })
}

fn render<T: Serialize>(
    call: &ToolCall,
    outcome: turnstile_core::Result<T>,
) -> turnstile_core::Result<ToolResult> {
    match outcome {
        Ok(value) => Ok(ToolResult::success(&call.id, serde_json::to_value(value)?)),
        Err(e) => {
            debug!(tool = %call.tool_name, error = %e, "shell tool call failed");
            Ok(ToolResult::failure(&call.id, error_body(&e)))
        }
    }
}

fn error_body(err: &TurnstileError) -> Value {
    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    let context_id = match err {
        TurnstileError::ShellNotFound { context_id }
        | TurnstileError::ShellAlreadyExited { context_id }
        | TurnstileError::ShellWrite { context_id, .. } => Some(*context_id),
        _ => None,
    };
    if let Some(id) = context_id {
        body["contextId"] = json!(id);
    }
    body
}

#[async_trait]
impl ToolExecutor for ShellTools {
    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: EXEC_COMMAND.into(),
                description: "Run a shell command in a persistent session and return its recent output. Waits up to yield_time_ms for output or exit, then returns even if the command is still running. Re-running the same command in the same workdir polls the existing session instead of starting a new one. Use write_stdin to answer prompts or poll for more output.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "cmd": {
                            "type": "string",
                            "description": "The command line to run"
                        },
                        "workdir": {
                            "type": "string",
                            "description": "Working directory (optional, defaults to the runtime's cwd)"
                        },
                        "shell": {
                            "type": "string",
                            "description": "Shell binary (optional)"
                        },
                        "login": {
                            "type": "boolean",
                            "description": "Run as a login shell (-lc)"
                        },
                        "yield_time_ms": {
                            "type": "integer",
                            "description": "How long to wait for output before returning"
                        },
                        "max_output_tokens": {
                            "type": "integer",
                            "description": "Output budget; roughly 4 characters per token"
                        }
                    },
                    "required": ["cmd"]
                }),
                is_mutating: true,
            },
            Tool {
                name: WRITE_STDIN.into(),
                description: "Write characters to a running session's stdin and return new output. Include \"\\n\" to submit a line. Send empty chars to just poll.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "context_id": {
                            "type": "integer",
                            "description": "Session id returned by exec_command"
                        },
                        "chars": {
                            "type": "string",
                            "description": "Raw characters to write (may be empty)"
                        },
                        "yield_time_ms": {
                            "type": "integer",
                            "description": "How long to wait for output before returning"
                        },
                        "max_output_tokens": {
                            "type": "integer",
                            "description": "Output budget; roughly 4 characters per token"
                        }
                    },
                    "required": ["context_id"]
                }),
                is_mutating: true,
            },
            Tool {
                name: CLOSE_SHELL.into(),
                description: "Close a session. With force, kills the process and its children; otherwise the process keeps running detached.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "context_id": {
                            "type": "integer",
                            "description": "Session id returned by exec_command"
                        },
                        "force": {
                            "type": "boolean",
                            "description": "Kill the process group if still running"
                        }
                    },
                    "required": ["context_id"]
                }),
                is_mutating: true,
            },
        ]
    }

    async fn execute(&self, call: &ToolCall) -> turnstile_core::Result<ToolResult> {
        match call.tool_name.as_str() {
            EXEC_COMMAND => {
                let outcome = match parse::<ExecCommandParams>(call) {
                    Ok(params) => self.manager.exec_command(params).await,
                    Err(e) => Err(e),
                };
                render(call, outcome)
            }
            WRITE_STDIN => {
                let outcome = match parse::<WriteStdinParams>(call) {
                    Ok(params) => self.manager.write_stdin(params).await,
                    Err(e) => Err(e),
                };
                render(call, outcome)
            }
            CLOSE_SHELL => {
                let outcome = match parse::<CloseShellParams>(call) {
                    Ok(params) => self.manager.close_shell(params).await,
                    Err(e) => Err(e),
                };
                render(call, outcome)
            }
            other => Err(TurnstileError::ToolNotFound(other.to_string())),
        }
    }
}
