//! Slot resolution and shared-context hoisting (§4.9 "Resolution",
//! "Shared context").

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use pml_core::ids::ToolId;
use pml_core::ui::{CollectedUiResource, RawSyncTarget, SyncRule, SyncTarget, UnresolvedSyncRule};

/// Build `toolId -> slot` from collected resources, preserving their
/// declared execution order (§4.9 "build `toolName -> slot`").
#[must_use]
pub fn build_slot_map(resources: &[CollectedUiResource]) -> HashMap<ToolId, usize> {
    resources.iter().map(|r| (r.source.clone(), r.slot)).collect()
}

/// Resolve one unresolved sync rule against the slot map. Unknown tool
/// ids — on either side — fall back to slot 0 with a logged warning,
/// keeping resolution total (§4.9: "unknown tool in sync rule -> falls
/// back to slot 0 with a logged warning").
#[must_use]
pub fn resolve_sync_rule(raw: &UnresolvedSyncRule, slots: &HashMap<ToolId, usize>) -> SyncRule {
    let from = resolve_tool_slot(&raw.from, slots);
    let to = match SyncTarget::parse_raw(&raw.to) {
        RawSyncTarget::Broadcast => SyncTarget::Broadcast,
        RawSyncTarget::Tool(tool) => SyncTarget::Slot(resolve_tool_slot(&tool, slots)),
    };
    SyncRule {
        from,
        event: raw.event.clone(),
        to,
        action: raw.action.clone(),
    }
}

fn resolve_tool_slot(raw_tool_id: &str, slots: &HashMap<ToolId, usize>) -> usize {
    match raw_tool_id.parse::<ToolId>().ok().and_then(|id| slots.get(&id).copied()) {
        Some(slot) => slot,
        None => {
            warn!(tool = raw_tool_id, "sync rule references unknown tool, falling back to slot 0");
            0
        }
    }
}

/// Resolve every sync rule in `raw_rules` against `slots`.
#[must_use]
pub fn resolve_sync_rules(raw_rules: &[UnresolvedSyncRule], slots: &HashMap<ToolId, usize>) -> Vec<SyncRule> {
    raw_rules.iter().map(|raw| resolve_sync_rule(raw, slots)).collect()
}

/// Hoist the shared context: for each key in `keys`, walk `resources`
/// in order and take the first non-absent value from any resource's
/// own context map (§4.9 "Shared context").
#[must_use]
pub fn hoist_shared_context(keys: &[String], resources: &[CollectedUiResource]) -> HashMap<String, Value> {
    let mut shared = HashMap::new();
    for key in keys {
        for resource in resources {
            if let Some(context) = &resource.context {
                if let Some(value) = context.get(key) {
                    shared.insert(key.clone(), value.clone());
                    break;
                }
            }
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(source: &str, uri: &str, slot: usize, context: Option<HashMap<String, Value>>) -> CollectedUiResource {
        CollectedUiResource {
            source: ToolId::new(source.split(':').next().unwrap(), source.split(':').nth(1).unwrap()),
            resource_uri: uri.to_string(),
            context,
            slot,
        }
    }

    #[test]
    fn slot_map_preserves_declared_order() {
        let resources = vec![
            resource("postgres:query", "ui://pg/1", 0, None),
            resource("viz:render", "ui://viz/1", 1, None),
        ];
        let slots = build_slot_map(&resources);
        assert_eq!(slots.get(&ToolId::new("postgres", "query")), Some(&0));
        assert_eq!(slots.get(&ToolId::new("viz", "render")), Some(&1));
    }

    #[test]
    fn sync_rule_resolves_known_tools() {
        let resources = vec![
            resource("postgres:query", "ui://pg/1", 0, None),
            resource("viz:render", "ui://viz/1", 1, None),
        ];
        let slots = build_slot_map(&resources);
        let raw = UnresolvedSyncRule {
            from: "postgres:query".to_string(),
            event: "filter".to_string(),
            to: "viz:render".to_string(),
            action: "update".to_string(),
        };
        let resolved = resolve_sync_rule(&raw, &slots);
        assert_eq!(resolved.from, 0);
        assert_eq!(resolved.to, SyncTarget::Slot(1));
    }

    #[test]
    fn sync_rule_broadcast_target_is_preserved() {
        let resources = vec![resource("postgres:query", "ui://pg/1", 0, None)];
        let slots = build_slot_map(&resources);
        let raw = UnresolvedSyncRule {
            from: "postgres:query".to_string(),
            event: "filter".to_string(),
            to: "*".to_string(),
            action: "update".to_string(),
        };
        let resolved = resolve_sync_rule(&raw, &slots);
        assert_eq!(resolved.to, SyncTarget::Broadcast);
    }

    #[test]
    fn unknown_tool_falls_back_to_slot_zero() {
        let slots = HashMap::new();
        let raw = UnresolvedSyncRule {
            from: "ghost:tool".to_string(),
            event: "x".to_string(),
            to: "ghost:tool".to_string(),
            action: "y".to_string(),
        };
        let resolved = resolve_sync_rule(&raw, &slots);
        assert_eq!(resolved.from, 0);
        assert_eq!(resolved.to, SyncTarget::Slot(0));
    }

    #[test]
    fn shared_context_takes_first_non_absent_value() {
        let mut ctx_a = HashMap::new();
        ctx_a.insert("theme".to_string(), Value::String("dark".to_string()));
        let resources = vec![
            resource("a:a", "ui://a", 0, None),
            resource("b:b", "ui://b", 1, Some(ctx_a)),
        ];
        let shared = hoist_shared_context(&["theme".to_string()], &resources);
        assert_eq!(shared.get("theme"), Some(&Value::String("dark".to_string())));
    }
}
