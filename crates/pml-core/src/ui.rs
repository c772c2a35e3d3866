//! The composite UI data model (§3, §4.9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ToolId;

/// A UI resource collected from one tool result during an `execute` run
/// (§3 Collected UI resource, §4.3 UI handling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedUiResource {
    /// The tool id whose result produced this UI.
    pub source: ToolId,
    /// The `ui://...` resource uri the tool result pointed at.
    pub resource_uri: String,
    /// Optional context map supplied alongside the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
    /// Execution order within the current run — the basis for slot
    /// assignment (§3 invariant: unique slot matching execution order).
    pub slot: usize,
}

/// Layout family for a composite UI document (§3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Side-by-side panes.
    Split,
    /// Tabbed panes, one active at a time.
    Tabs,
    /// A CSS grid of panes.
    Grid,
    /// Vertically stacked panes.
    Stack,
}

/// A sync rule target: either a specific slot or a broadcast to all
/// other slots (§3 Sync rule, §4.9 resolution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncTarget {
    /// A specific resolved slot index.
    Slot(usize),
    /// Broadcast to every iframe except the sender.
    Broadcast,
}

impl SyncTarget {
    /// Parse a pre-resolution `to` field: either a tool id string or `"*"`.
    #[must_use]
    pub fn parse_raw(raw: &str) -> RawSyncTarget {
        if raw == "*" {
            RawSyncTarget::Broadcast
        } else {
            RawSyncTarget::Tool(raw.to_string())
        }
    }
}

/// A sync rule's `to` field before slot resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSyncTarget {
    /// A tool id string, to be resolved to a slot index.
    Tool(String),
    /// The broadcast wildcard `"*"`.
    Broadcast,
}

/// A declarative event-routing rule, in its resolved (integer-slot) form
/// (§3 Sync rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRule {
    /// Source slot index.
    pub from: usize,
    /// The UI event name that triggers this rule.
    pub event: String,
    /// Target slot, or broadcast.
    pub to: SyncTarget,
    /// The action forwarded to the target(s).
    pub action: String,
}

/// An unresolved sync rule as received from the cloud's
/// `ui_orchestration.sync` field (§6), keyed by tool id rather than slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedSyncRule {
    /// Source tool id.
    pub from: String,
    /// The UI event name that triggers this rule.
    pub event: String,
    /// Target tool id, or `"*"` for broadcast.
    pub to: String,
    /// The action forwarded to the target(s).
    pub action: String,
}

/// The cloud's `ui_orchestration` field from the `execute_locally`
/// envelope (§6), prior to slot resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Requested layout family.
    pub layout: Layout,
    /// Tool-id-keyed sync rules, resolved to slots by the UI generator.
    #[serde(default)]
    pub sync: Vec<UnresolvedSyncRule>,
    /// Keys to hoist into the shared context passed to every iframe.
    #[serde(default)]
    pub shared_context: Vec<String>,
}

/// A fully-assembled composite UI descriptor (§3 Composite UI descriptor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeUiDescriptor {
    /// Layout family.
    pub layout: Layout,
    /// Ordered child UI resources (slot `i` is `children[i]`).
    pub children: Vec<CollectedUiResource>,
    /// Resolved sync rules.
    pub sync_rules: Vec<SyncRule>,
    /// Keys whose first non-absent value across resources is hoisted into
    /// the shared context passed to every iframe (§4.9 Shared context).
    pub shared_context: HashMap<String, Value>,
    /// The `ui://pml/workflow/<uuid>` resource uri this descriptor is
    /// registered under.
    pub resource_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_target_parses_wildcard_and_tool() {
        assert_eq!(SyncTarget::parse_raw("*"), RawSyncTarget::Broadcast);
        assert_eq!(
            SyncTarget::parse_raw("viz:render"),
            RawSyncTarget::Tool("viz:render".to_string())
        );
    }
}
