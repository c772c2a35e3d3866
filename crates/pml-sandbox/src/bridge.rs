//! The out-of-sandbox RPC bridge (§4.4).
//!
//! The sandboxed child's stdout carries two kinds of lines: `rpc_call`
//! requests (while the script is running) and exactly one final
//! [`crate::wrap::RESULT_MARKER`]-prefixed envelope. [`RpcBridge`] reads
//! the child's stdout line by line, dispatches `rpc_call` lines to a
//! [`ToolRouter`], writes `rpc_result` replies back to the child's
//! stdin, and returns the raw marker line once it appears.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tracing::{debug, warn};

use pml_core::workflow::ApprovalKind;

use crate::error::{SandboxError, SandboxResult};
use crate::wrap::RESULT_MARKER;

/// Why a routed tool call did not return a result.
///
/// [`RouteError::Pause`] is distinct from a genuine failure: the router
/// is asking the orchestrator to suspend this workflow for a human
/// decision rather than reporting the call as failed (§4.3 HIL_PAUSE
/// transition). It crosses back into the sandboxed child as a thrown
/// error carrying a `pml_pause` payload, then back out again once the
/// child's result envelope is parsed — see
/// [`crate::executor::try_parse_pause`].
#[derive(Debug, Clone)]
pub enum RouteError {
    /// Execution should pause pending human approval.
    Pause {
        /// What kind of approval is needed.
        approval_kind: ApprovalKind,
        /// The tool call that triggered the pause, as `server:tool`.
        tool_id: String,
        /// Kind-specific payload, passed through for the host to render.
        payload: Value,
    },
    /// The call failed outright; no pause is warranted.
    Failed(String),
}

impl RouteError {
    /// A plain failure, the common case for routing/transport errors.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Routes a tool call made from inside the sandbox to wherever it is
/// actually served — a local MCP server, the cloud proxy, or a capsule.
///
/// Implemented outside this crate (the orchestrator owns routing
/// policy); the sandbox only needs something that can answer a call.
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Execute `tool` on `server` with `args`, returning its JSON result.
    async fn route_call(&self, server: &str, tool: &str, args: Value) -> Result<Value, RouteError>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SandboxMessage {
    RpcCall {
        id: String,
        server: String,
        tool: String,
        args: Value,
    },
}

#[derive(Debug, Serialize)]
struct RpcResult<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pml_pause: Option<PmlPauseWire>,
}

/// The wire shape of a pause signal, threaded through the child's
/// stdin as `rpc_result.error.pml_pause` so the shim's catch block can
/// re-attach it to the thrown `Error` as `err.pml_pause`.
#[derive(Debug, Serialize)]
struct PmlPauseWire {
    approval_kind: ApprovalKind,
    tool_id: String,
    payload: Value,
}

/// Drives one sandboxed execution's stdio protocol.
pub struct RpcBridge {
    router: Arc<dyn ToolRouter>,
}

impl RpcBridge {
    /// Build a bridge that routes `rpc_call`s through `router`.
    #[must_use]
    pub fn new(router: Arc<dyn ToolRouter>) -> Self {
        Self { router }
    }

    /// Pump the child's stdout until the `<MARKER>` result line appears,
    /// answering every `rpc_call` line along the way.
    ///
    /// Lines that are neither valid JSON nor a recognized message shape
    /// are logged and otherwise ignored — the child may emit its own
    /// diagnostic output on stdout before the shim takes over.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::ParseError`] if stdout closes (the child
    /// exited) before a marker line was produced.
    pub async fn run(
        &self,
        stdout: ChildStdout,
        mut stdin: ChildStdin,
    ) -> SandboxResult<String> {
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(SandboxError::Io)?
        {
            if let Some(marker_body) = line.strip_prefix(RESULT_MARKER) {
                return Ok(marker_body.to_string());
            }

            match serde_json::from_str::<SandboxMessage>(&line) {
                Ok(SandboxMessage::RpcCall { id, server, tool, args }) => {
                    debug!(%id, %server, %tool, "sandbox rpc_call");
                    let reply = match self.router.route_call(&server, &tool, args).await {
                        Ok(result) => RpcResult {
                            kind: "rpc_result",
                            id: &id,
                            success: true,
                            result: Some(result),
                            error: None,
                        },
                        Err(RouteError::Failed(message)) => RpcResult {
                            kind: "rpc_result",
                            id: &id,
                            success: false,
                            result: None,
                            error: Some(RpcError { message, pml_pause: None }),
                        },
                        Err(RouteError::Pause { approval_kind, tool_id, payload }) => RpcResult {
                            kind: "rpc_result",
                            id: &id,
                            success: false,
                            result: None,
                            error: Some(RpcError {
                                message: format!("approval required: {tool_id}"),
                                pml_pause: Some(PmlPauseWire { approval_kind, tool_id, payload }),
                            }),
                        },
                    };
                    let mut payload = serde_json::to_vec(&reply)
                        .map_err(|e| SandboxError::ParseError(e.to_string()))?;
                    payload.push(b'\n');
                    stdin.write_all(&payload).await.map_err(SandboxError::Io)?;
                    stdin.flush().await.map_err(SandboxError::Io)?;
                }
                Err(_) => {
                    warn!(%line, "sandbox child wrote an unrecognized stdout line");
                }
            }
        }

        Err(SandboxError::ParseError(
            "sandbox process exited before producing a result".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoRouter;

    #[async_trait]
    impl ToolRouter for EchoRouter {
        async fn route_call(&self, server: &str, tool: &str, args: Value) -> Result<Value, RouteError> {
            Ok(serde_json::json!({ "server": server, "tool": tool, "echo": args }))
        }
    }

    #[test]
    fn rpc_result_serializes_success_shape() {
        let reply = RpcResult {
            kind: "rpc_result",
            id: "rpc-0",
            success: true,
            result: Some(serde_json::json!(42)),
            error: None,
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "rpc_result");
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn router_echoes_call() {
        let router = EchoRouter;
        let result = router.route_call("fs", "read", serde_json::json!({"path": "/x"})).await.unwrap();
        assert_eq!(result["tool"], "read");
    }
}
