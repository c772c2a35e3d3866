//! Tool descriptor and declared-permission model (§3 Tool descriptor).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ToolId;

/// Where a tool call is routed: to the client-side (local MCP server) or
/// proxied through the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routing {
    /// The tool is invoked against a local MCP subprocess.
    Client,
    /// The tool call is proxied to the remote cloud.
    Server,
}

/// The named permission sets walked by the escalation engine (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionSet {
    /// No operations permitted.
    Minimal,
    /// Read-only filesystem access.
    Readonly,
    /// Read/write filesystem access.
    Filesystem,
    /// Outbound network access.
    NetworkApi,
    /// The standard MCP tool surface.
    McpStandard,
    /// Elevated, never reachable by automatic escalation.
    Trusted,
}

impl PermissionSet {
    /// All sets in the fixed priority order used by the escalation walk
    /// (§4.7 step 4): `[readonly, filesystem, network-api, mcp-standard]`.
    #[must_use]
    pub fn escalation_order() -> &'static [PermissionSet] {
        &[
            PermissionSet::Readonly,
            PermissionSet::Filesystem,
            PermissionSet::NetworkApi,
            PermissionSet::McpStandard,
        ]
    }
}

/// A tool's wire-level descriptor, as published by `tools/list` (§4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool id, `server:name`.
    pub id: ToolId,
    /// Display name shown to the host.
    pub display_name: String,
    /// JSON schema describing valid call arguments.
    pub input_schema: Value,
    /// JSON schema describing the result shape, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Declared routing.
    pub routing: Routing,
    /// Declared minimal permission set required to invoke this tool.
    pub permission_set: PermissionSet,
}

impl ToolDescriptor {
    /// Render the MCP `tools/list` entry shape: `{name, description, inputSchema}`.
    #[must_use]
    pub fn to_mcp_entry(&self) -> Value {
        serde_json::json!({
            "name": self.id.as_str(),
            "description": self.display_name,
            "inputSchema": self.input_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_order_is_fixed_and_excludes_minimal_and_trusted() {
        let order = PermissionSet::escalation_order();
        assert_eq!(order.len(), 4);
        assert!(!order.contains(&PermissionSet::Minimal));
        assert!(!order.contains(&PermissionSet::Trusted));
    }

    #[test]
    fn mcp_entry_shape() {
        let descriptor = ToolDescriptor {
            id: ToolId::new("fs", "read"),
            display_name: "Read a file".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
            output_schema: None,
            routing: Routing::Client,
            permission_set: PermissionSet::Readonly,
        };
        let entry = descriptor.to_mcp_entry();
        assert_eq!(entry["name"], "fs:read");
        assert_eq!(entry["description"], "Read a file");
    }
}
