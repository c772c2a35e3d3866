//! UI-result collection and the 0/1/≥2 composite-generation decision
//! (§4.3 "UI handling").

use serde_json::Value;

use pml_core::ids::ToolId;
use pml_core::ui::{CollectedUiResource, OrchestrationConfig};

/// Extract a `_meta.ui` entry from one tool call result, if present.
#[must_use]
pub fn extract_ui_resource(source: &ToolId, meta: Option<&Value>, slot: usize) -> Option<CollectedUiResource> {
    let ui = meta?.get("ui")?;
    let resource_uri = ui.get("resourceUri")?.as_str()?.to_string();
    let context = ui.get("context").and_then(|c| c.as_object()).map(|map| {
        map.iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<std::collections::HashMap<_, _>>()
    });
    Some(CollectedUiResource { source: source.clone(), resource_uri, context, slot })
}

/// What the `_meta.ui` field of the final tool result should contain,
/// per the 0/1/≥2 rule (§4.3):
#[derive(Debug, Clone)]
pub enum UiOutcome {
    /// No UI-bearing results were collected: omit `_meta.ui` entirely.
    None,
    /// Exactly one: pass it through unchanged.
    PassThrough {
        /// The sole collected resource's uri.
        resource_uri: String,
        /// Its context, if any.
        context: Option<Value>,
    },
    /// Two or more: the composite generator (§4.9) must run and its
    /// output registered as a UI resource before this variant is built.
    Composite {
        /// The registered composite resource's uri.
        resource_uri: String,
        /// The composite HTML document.
        html: String,
    },
}

/// Decide which [`UiOutcome`] applies to a completed execution's
/// collected resources (§4.3). Does not itself invoke the composite
/// generator — callers build [`UiOutcome::Composite`] once they have.
#[must_use]
pub fn classify_collected(resources: &[CollectedUiResource]) -> CollectedClass {
    match resources.len() {
        0 => CollectedClass::None,
        1 => CollectedClass::Single(resources[0].clone()),
        _ => CollectedClass::Composite,
    }
}

/// The three cases [`classify_collected`] distinguishes.
#[derive(Debug, Clone)]
pub enum CollectedClass {
    /// Nothing collected.
    None,
    /// Exactly one collected resource.
    Single(CollectedUiResource),
    /// Two or more; needs the composite generator plus an
    /// [`OrchestrationConfig`] (defaulted if the cloud didn't supply one).
    Composite,
}

/// The default orchestration used when the cloud's envelope omitted
/// `ui_orchestration` but ≥2 UIs were still collected (§4.3 implies
/// composition always happens at ≥2; a sensible default keeps the
/// generator total without requiring cloud cooperation).
#[must_use]
pub fn default_orchestration() -> OrchestrationConfig {
    OrchestrationConfig {
        layout: pml_core::ui::Layout::Split,
        sync: Vec::new(),
        shared_context: Vec::new(),
    }
}
