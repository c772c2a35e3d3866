//! `resources/read` for `ui://` resources (§4.1): previously-registered
//! composite or per-tool HTML documents, served back to the host or an
//! iframe. Duplicate registration is idempotent at the [`pml_orchestrator::UiRegistry`]
//! layer; this module only renders the MCP `resources/read` envelope.

use serde_json::{json, Value};

use pml_orchestrator::UiRegistry;

/// Read a `ui://<path>` resource, returning the MCP `resources/read`
/// envelope (§6: `{contents:[{uri, mimeType:"text/html", text}]}`), or
/// `None` if nothing is registered at that uri.
#[must_use]
pub fn read_ui_resource(registry: &UiRegistry, uri: &str) -> Option<Value> {
    let html = registry.get(uri)?;
    Some(json!({
        "contents": [{
            "uri": uri,
            "mimeType": "text/html",
            "text": html,
        }]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_resource_renders_the_read_envelope() {
        let registry = UiRegistry::new();
        registry.register("ui://pml/workflow/1".to_string(), "<html></html>".to_string());
        let envelope = read_ui_resource(&registry, "ui://pml/workflow/1").expect("present");
        assert_eq!(envelope["contents"][0]["mimeType"], "text/html");
        assert_eq!(envelope["contents"][0]["text"], "<html></html>");
    }

    #[test]
    fn unregistered_resource_is_none() {
        let registry = UiRegistry::new();
        assert!(read_ui_resource(&registry, "ui://nope").is_none());
    }
}
