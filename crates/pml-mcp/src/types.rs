//! Wire-adjacent types for the stdio client (§4.1, §4.2).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed `tools/list` entry (§4.2 `listTools()`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// The tool's name as declared by the server.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// The tool's input JSON schema.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The opaque result of a `tools/call` (§4.2 `callTool()`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The MCP content array, as returned verbatim by the server.
    pub content: Value,
    /// Optional `_meta` block (e.g. `_meta.ui`, §3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A named JSON-RPC method about to be sent, used for logging/timeout
/// error messages.
#[derive(Debug, Clone)]
pub struct MethodCall {
    /// The JSON-RPC method name.
    pub method: String,
    /// The request id assigned to this call.
    pub id: u64,
}

/// A point-in-time snapshot of one server's connection state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerStatus {
    /// The server id.
    pub name: String,
    /// Whether the subprocess is currently running and connected.
    pub running: bool,
    /// Process id, if running.
    pub pid: Option<u32>,
    /// Number of tools last seen from this server.
    pub tool_count: usize,
    /// Number of automatic restarts performed so far.
    pub restart_count: u32,
}
