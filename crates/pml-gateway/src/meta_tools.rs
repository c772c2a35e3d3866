//! Static descriptors for the PML meta-tools (§4.1): `discover`,
//! `execute`, `admin`, `abort`, `replan`. `tools/list` serves exactly
//! this fixed set (plus any optionally-exposed capabilities, §4.1) and
//! never performs I/O — every schema here is a literal.

use pml_core::ids::ToolId;
use pml_core::tool::{PermissionSet, Routing, ToolDescriptor};
use serde_json::json;

/// `discover`: search the capability registry by natural-language intent.
#[must_use]
pub fn discover_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new("pml", "discover"),
        display_name: "Search for a registered capability by intent".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string"},
                "org": {"type": "string"},
                "project": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1, "default": 10}
            },
            "required": ["intent", "org", "project"]
        }),
        output_schema: None,
        routing: Routing::Server,
        permission_set: PermissionSet::Readonly,
    }
}

/// `execute`: the hybrid execution entry point (§4.3, §6 input schema).
#[must_use]
pub fn execute_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new("pml", "execute"),
        display_name: "Run an intent or code through the hybrid execution pipeline".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string"},
                "code": {"type": "string"},
                "options": {
                    "type": "object",
                    "properties": {
                        "timeout": {"type": "integer"},
                        "per_layer_validation": {"type": "boolean"}
                    }
                },
                "accept_suggestion": {
                    "type": "object",
                    "properties": {
                        "callName": {"type": "string"},
                        "args": {"type": "object"}
                    },
                    "required": ["callName"]
                },
                "continue_workflow": {
                    "type": "object",
                    "properties": {
                        "workflow_id": {"type": "string"},
                        "approved": {"type": "boolean"}
                    },
                    "required": ["workflow_id", "approved"]
                }
            }
        }),
        output_schema: None,
        routing: Routing::Server,
        permission_set: PermissionSet::Minimal,
    }
}

/// `admin`: read-only operational introspection (server status, pending
/// workflow count, health). Never mutates registry or server state.
#[must_use]
pub fn admin_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new("pml", "admin"),
        display_name: "Inspect gateway operational state".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list_servers", "server_status", "list_pending", "health"]
                }
            },
            "required": ["action"]
        }),
        output_schema: None,
        routing: Routing::Server,
        permission_set: PermissionSet::Trusted,
    }
}

/// `abort`: invalidate a pending workflow (§5 "Cancellation and timeouts").
#[must_use]
pub fn abort_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new("pml", "abort"),
        display_name: "Abort a paused workflow".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "workflow_id": {"type": "string"}
            },
            "required": ["workflow_id"]
        }),
        output_schema: None,
        routing: Routing::Server,
        permission_set: PermissionSet::Minimal,
    }
}

/// `replan`: discard a workflow's paused state and re-forward its
/// original intent/code to the cloud as a fresh `FORWARD_CLOUD`
/// transition (§4.3) — there is no separate cloud "replan" verb in
/// [`pml_orchestrator::CloudPlanner`], so this is a thin alias over
/// `execute` with `continue_workflow` omitted, after first deleting any
/// stale pending entry for the named workflow.
#[must_use]
pub fn replan_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        id: ToolId::new("pml", "replan"),
        display_name: "Discard a paused workflow and re-plan it from scratch".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "workflow_id": {"type": "string"},
                "intent": {"type": "string"},
                "code": {"type": "string"}
            },
            "required": ["workflow_id"]
        }),
        output_schema: None,
        routing: Routing::Server,
        permission_set: PermissionSet::Minimal,
    }
}

/// The fixed, static `tools/list` set (§4.1: "static schema per tool;
/// never performs I/O to the cloud").
#[must_use]
pub fn meta_tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        discover_descriptor(),
        execute_descriptor(),
        admin_descriptor(),
        abort_descriptor(),
        replan_descriptor(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_five_meta_tools_are_registered() {
        assert_eq!(meta_tool_descriptors().len(), 5);
    }

    #[test]
    fn every_descriptor_has_a_pml_prefixed_id() {
        for descriptor in meta_tool_descriptors() {
            assert_eq!(descriptor.id.server(), "pml");
        }
    }
}
