//! Top-level composite UI assembly (§4.9): resolve + render as one pure
//! step from `(collected resources, orchestration config, workflow id)`.

use pml_core::ids::WorkflowId;
use pml_core::ui::{CollectedUiResource, CompositeUiDescriptor, OrchestrationConfig};

use crate::error::{UiError, UiResult};
use crate::html::render_html;
use crate::resolve::{build_slot_map, hoist_shared_context, resolve_sync_rules};

/// Verify the §3 invariant that every collected resource's slot is
/// unique and the set forms `[0..n)`.
///
/// # Errors
///
/// Returns [`UiError::DuplicateSlot`] if two resources share a slot.
pub fn validate_slots(resources: &[CollectedUiResource]) -> UiResult<()> {
    let mut seen = vec![false; resources.len()];
    for resource in resources {
        if resource.slot >= resources.len() {
            // Slots outside [0, n) cannot collide by index but still
            // violate "permutation of [0..n-1]"; surface as a duplicate
            // of themselves so the caller sees a clear rejection.
            return Err(UiError::DuplicateSlot(resource.slot));
        }
        if std::mem::replace(&mut seen[resource.slot], true) {
            return Err(UiError::DuplicateSlot(resource.slot));
        }
    }
    Ok(())
}

/// Build the resolved composite descriptor and its rendered HTML from
/// `resources` (ordered by execution) and `orchestration`.
///
/// Total over `resources`: empty input produces a valid document with
/// no iframes rather than an error (§4.9, §8 boundary behavior).
///
/// # Errors
///
/// Returns [`UiError::DuplicateSlot`] if `resources` violates the
/// unique-slot invariant (§3).
pub fn build_composite_ui(
    workflow_id: WorkflowId,
    resources: &[CollectedUiResource],
    orchestration: &OrchestrationConfig,
) -> UiResult<(CompositeUiDescriptor, String)> {
    validate_slots(resources)?;

    let mut ordered = resources.to_vec();
    ordered.sort_by_key(|r| r.slot);

    let slots = build_slot_map(&ordered);
    let sync_rules = resolve_sync_rules(&orchestration.sync, &slots);
    let shared_context = hoist_shared_context(&orchestration.shared_context, &ordered);
    let resource_uri = format!("ui://pml/workflow/{workflow_id}");

    let descriptor = CompositeUiDescriptor {
        layout: orchestration.layout,
        children: ordered,
        sync_rules,
        shared_context,
        resource_uri,
    };
    let html = render_html(&descriptor);
    Ok((descriptor, html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::ids::ToolId;
    use pml_core::ui::{Layout, SyncTarget, UnresolvedSyncRule};

    fn two_resources() -> Vec<CollectedUiResource> {
        vec![
            CollectedUiResource {
                source: ToolId::new("postgres", "query"),
                resource_uri: "ui://pg/tbl/1".to_string(),
                context: None,
                slot: 0,
            },
            CollectedUiResource {
                source: ToolId::new("viz", "render"),
                resource_uri: "ui://viz/chart/1".to_string(),
                context: None,
                slot: 1,
            },
        ]
    }

    #[test]
    fn builds_descriptor_matching_scenario_5() {
        let orchestration = OrchestrationConfig {
            layout: Layout::Split,
            sync: vec![UnresolvedSyncRule {
                from: "postgres:query".to_string(),
                event: "filter".to_string(),
                to: "viz:render".to_string(),
                action: "update".to_string(),
            }],
            shared_context: Vec::new(),
        };
        let workflow_id = WorkflowId::new();
        let (descriptor, html) = build_composite_ui(workflow_id, &two_resources(), &orchestration).unwrap();

        assert_eq!(descriptor.layout, Layout::Split);
        assert_eq!(descriptor.resource_uri, format!("ui://pml/workflow/{workflow_id}"));
        assert_eq!(descriptor.sync_rules.len(), 1);
        assert_eq!(descriptor.sync_rules[0].from, 0);
        assert_eq!(descriptor.sync_rules[0].to, SyncTarget::Slot(1));
        assert!(html.contains("data-slot=\"0\""));
        assert!(html.contains("data-slot=\"1\""));
    }

    #[test]
    fn empty_resources_produce_valid_document() {
        let orchestration = OrchestrationConfig {
            layout: Layout::Stack,
            sync: Vec::new(),
            shared_context: Vec::new(),
        };
        let (descriptor, html) = build_composite_ui(WorkflowId::new(), &[], &orchestration).unwrap();
        assert!(descriptor.children.is_empty());
        assert!(!html.contains("<iframe"));
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let mut resources = two_resources();
        resources[1].slot = 0;
        let orchestration = OrchestrationConfig {
            layout: Layout::Split,
            sync: Vec::new(),
            shared_context: Vec::new(),
        };
        let result = build_composite_ui(WorkflowId::new(), &resources, &orchestration);
        assert!(matches!(result, Err(UiError::DuplicateSlot(0))));
    }

    #[test]
    fn same_inputs_yield_same_descriptor() {
        let orchestration = OrchestrationConfig {
            layout: Layout::Grid,
            sync: Vec::new(),
            shared_context: Vec::new(),
        };
        let workflow_id = WorkflowId::new();
        let (a, html_a) = build_composite_ui(workflow_id, &two_resources(), &orchestration).unwrap();
        let (b, html_b) = build_composite_ui(workflow_id, &two_resources(), &orchestration).unwrap();
        assert_eq!(a.resource_uri, b.resource_uri);
        assert_eq!(html_a, html_b);
    }
}
