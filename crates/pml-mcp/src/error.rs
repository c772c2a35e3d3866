//! MCP client error taxonomy (§4.2, §7 `TransportError`/`TimeoutError`).

use thiserror::Error;

/// Errors raised by the stdio subprocess client.
#[derive(Debug, Error)]
pub enum McpError {
    /// The child process could not be spawned.
    #[error("failed to spawn mcp server '{name}': {reason}")]
    ConnectError {
        /// The server id that failed to spawn.
        name: String,
        /// The underlying OS error.
        reason: String,
    },

    /// No response arrived within the request's timeout.
    #[error("mcp request '{method}' to '{server}' timed out after {timeout_ms}ms")]
    TimeoutError {
        /// The server id.
        server: String,
        /// The JSON-RPC method that timed out.
        method: String,
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The server's `initialize` response did not conform to the protocol.
    #[error("mcp server '{name}' failed protocol handshake: {reason}")]
    ProtocolError {
        /// The server id.
        name: String,
        /// Description of the non-conformance.
        reason: String,
    },

    /// The named server is not currently running.
    #[error("mcp server '{name}' is not running")]
    ServerNotRunning {
        /// The server id.
        name: String,
    },

    /// The named server is already registered.
    #[error("mcp server '{name}' is already registered")]
    ServerAlreadyExists {
        /// The server id.
        name: String,
    },

    /// A `tools/call` request returned a JSON-RPC error.
    #[error("tool call '{tool}' on '{server}' failed: {reason}")]
    ToolCallFailed {
        /// The server id.
        server: String,
        /// The tool name.
        tool: String,
        /// The error reported by the server.
        reason: String,
    },

    /// Transport-level I/O failure (broken pipe, subprocess exited).
    #[error("mcp transport error on '{server}': {source}")]
    Transport {
        /// The server id.
        server: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A response line failed to parse as JSON.
    #[error("malformed mcp response from '{server}': {reason}")]
    MalformedResponse {
        /// The server id.
        server: String,
        /// Description of the parse failure.
        reason: String,
    },
}

/// Result alias for [`McpError`].
pub type McpResult<T> = Result<T, McpError>;
