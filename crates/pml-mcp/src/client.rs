//! A single-server MCP client over [`StdioTransport`] (§4.2).

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{McpError, McpResult};
use crate::transport::StdioTransport;
use crate::types::{McpTool, ToolCallResult};

/// The MCP protocol version this gateway speaks (§4.2 `connect()`).
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A client bound to exactly one MCP server subprocess.
pub struct McpClient {
    name: String,
    config: ServerConfig,
    transport: Option<StdioTransport>,
    tools: RwLock<Vec<McpTool>>,
}

impl McpClient {
    /// Construct an unconnected client for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ServerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            transport: None,
            tools: RwLock::new(Vec::new()),
        }
    }

    /// The server id this client is bound to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the underlying subprocess is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Spawn the subprocess and perform the `initialize` handshake
    /// (§4.2 `connect()`).
    ///
    /// # Errors
    ///
    /// [`McpError::ConnectError`] on spawn failure, [`McpError::TimeoutError`]
    /// if `initialize` does not answer in time, [`McpError::ProtocolError`]
    /// if the response is non-conformant.
    pub async fn connect(&mut self) -> McpResult<()> {
        let transport = StdioTransport::spawn(
            &self.name,
            &self.config.command,
            &self.config.args,
            &self.config.env,
        )
        .await?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "pml-gateway", "version": env!("CARGO_PKG_VERSION")},
        });
        let response = transport.request("initialize", params, timeout).await?;

        let result = response.get("result").ok_or_else(|| McpError::ProtocolError {
            name: self.name.clone(),
            reason: "initialize response missing 'result'".to_string(),
        })?;
        let server_protocol = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::ProtocolError {
                name: self.name.clone(),
                reason: "initialize result missing 'protocolVersion'".to_string(),
            })?;
        if server_protocol != PROTOCOL_VERSION {
            return Err(McpError::ProtocolError {
                name: self.name.clone(),
                reason: format!(
                    "protocol version mismatch: server speaks '{server_protocol}', client speaks '{PROTOCOL_VERSION}'"
                ),
            });
        }

        transport
            .notify("notifications/initialized", serde_json::json!({}))
            .await?;

        info!(server = %self.name, "mcp handshake complete");
        self.transport = Some(transport);
        self.refresh_tools().await?;
        Ok(())
    }

    async fn transport(&self) -> McpResult<&StdioTransport> {
        self.transport.as_ref().ok_or_else(|| McpError::ServerNotRunning {
            name: self.name.clone(),
        })
    }

    /// `tools/list` (§4.2 `listTools()`).
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected or the call fails.
    pub async fn refresh_tools(&self) -> McpResult<Vec<McpTool>> {
        let transport = self.transport().await?;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = transport
            .request("tools/list", serde_json::json!({}), timeout)
            .await?;
        let result = response.get("result").cloned().unwrap_or(Value::Null);
        let tools: Vec<McpTool> = serde_json::from_value(
            result.get("tools").cloned().unwrap_or(Value::Array(Vec::new())),
        )
        .map_err(|e| McpError::MalformedResponse {
            server: self.name.clone(),
            reason: e.to_string(),
        })?;

        let mut cache = self.tools.write().await;
        *cache = tools.clone();
        Ok(tools)
    }

    /// The cached tool list from the last `refresh_tools` call.
    pub async fn cached_tools(&self) -> Vec<McpTool> {
        self.tools.read().await.clone()
    }

    /// `tools/call` (§4.2 `callTool()`).
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected, the call times
    /// out, or the server reports a tool-level failure.
    pub async fn call_tool(&self, tool: &str, args: Value) -> McpResult<ToolCallResult> {
        let transport = self.transport().await?;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let params = serde_json::json!({"name": tool, "arguments": args});
        let response = transport.request("tools/call", params, timeout).await?;

        if let Some(error) = response.get("error") {
            return Err(McpError::ToolCallFailed {
                server: self.name.clone(),
                tool: tool.to_string(),
                reason: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        let result = response.get("result").cloned().unwrap_or(Value::Null);
        Ok(ToolCallResult {
            content: result.get("content").cloned().unwrap_or(Value::Array(Vec::new())),
            meta: result.get("_meta").cloned(),
        })
    }

    /// `resources/read` proxied to this server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not connected or the call fails.
    pub async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        let transport = self.transport().await?;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = transport
            .request("resources/read", serde_json::json!({"uri": uri}), timeout)
            .await?;
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the subprocess cannot be killed.
    pub async fn close(&mut self) -> McpResult<()> {
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// The underlying config.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build a `tool_id -> McpTool` map for tool ids of the form `server:name`.
    pub async fn tool_map(&self) -> HashMap<String, McpTool> {
        self.cached_tools()
            .await
            .into_iter()
            .map(|t| (format!("{}:{}", self.name, t.name), t))
            .collect()
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
