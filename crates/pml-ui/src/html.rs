//! Deterministic HTML assembly for a resolved composite UI (§4.9 "HTML").

use pml_core::ui::{CompositeUiDescriptor, Layout, SyncTarget};

/// The protocol version the composite document's embedded event bus
/// advertises in its `ui/initialize` response (§8 scenario 5).
pub const UI_PROTOCOL_VERSION: &str = "2026-01-26";

fn layout_css(layout: Layout) -> &'static str {
    match layout {
        Layout::Split => {
            ".pml-composite{display:flex;flex-direction:row;height:100vh;}\
             .pml-pane{flex:1 1 0;min-width:0;border:none;}"
        }
        Layout::Tabs => {
            ".pml-composite{display:flex;flex-direction:column;height:100vh;}\
             .pml-tabbar{display:flex;flex:0 0 auto;}\
             .pml-tab{flex:1 1 0;padding:8px;text-align:center;cursor:pointer;}\
             .pml-pane{flex:1 1 auto;border:none;display:none;}\
             .pml-pane.pml-active{display:block;}"
        }
        Layout::Grid => {
            ".pml-composite{display:grid;grid-template-columns:repeat(auto-fit,minmax(320px,1fr));height:100vh;}\
             .pml-pane{border:none;min-height:200px;}"
        }
        Layout::Stack => {
            ".pml-composite{display:flex;flex-direction:column;height:100vh;}\
             .pml-pane{flex:1 1 0;border:none;}"
        }
    }
}

/// Escape a JSON payload so it can be embedded inside an inline
/// `<script>` block without risking premature tag termination if a
/// string value contains `</script>` (§9 open question: audited here
/// rather than relying on `JSON.stringify` escaping alone).
fn escape_for_inline_script(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\!--")
}

fn sync_target_json(target: &SyncTarget) -> String {
    match target {
        SyncTarget::Slot(slot) => slot.to_string(),
        SyncTarget::Broadcast => "\"*\"".to_string(),
    }
}

fn render_sync_rules_js(descriptor: &CompositeUiDescriptor) -> String {
    let entries: Vec<String> = descriptor
        .sync_rules
        .iter()
        .map(|rule| {
            format!(
                "{{\"from\":{from},\"event\":{event},\"to\":{to},\"action\":{action}}}",
                from = rule.from,
                event = serde_json::to_string(&rule.event).unwrap_or_default(),
                to = sync_target_json(&rule.to),
                action = serde_json::to_string(&rule.action).unwrap_or_default(),
            )
        })
        .collect();
    format!("[{}]", entries.join(","))
}

/// Render `descriptor` into a self-contained HTML document. Total and
/// referentially transparent: the same descriptor always yields the
/// same document (§4.9, §8 round-trip property).
#[must_use]
pub fn render_html(descriptor: &CompositeUiDescriptor) -> String {
    let iframes: String = descriptor
        .children
        .iter()
        .map(|child| {
            format!(
                "<iframe class=\"pml-pane\" sandbox=\"allow-scripts allow-same-origin\" \
                 data-slot=\"{slot}\" data-source=\"{source}\" src=\"{src}\"></iframe>",
                slot = child.slot,
                source = html_escape(child.source.as_str()),
                src = html_escape(&child.resource_uri),
            )
        })
        .collect();

    let sync_rules_js = render_sync_rules_js(descriptor);
    let shared_context_json = escape_for_inline_script(
        &serde_json::to_string(&descriptor.shared_context).unwrap_or_else(|_| "{}".to_string()),
    );
    let resource_uri_json = escape_for_inline_script(
        &serde_json::to_string(&descriptor.resource_uri).unwrap_or_else(|_| "\"\"".to_string()),
    );
    let slot_count = descriptor.children.len();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>PML composite UI</title>
<style>
:root{{--pml-bg:#ffffff;--pml-fg:#111111;}}
@media (prefers-color-scheme: dark){{:root{{--pml-bg:#111111;--pml-fg:#eeeeee;}}}}
body{{margin:0;background:var(--pml-bg);color:var(--pml-fg);font-family:system-ui,sans-serif;}}
{layout_css}
</style>
</head>
<body>
<div class="pml-composite" data-resource-uri={resource_uri_json} data-slot-count="{slot_count}">
{iframes}
</div>
<script>
(function() {{
  "use strict";
  var PROTOCOL_VERSION = "{protocol_version}";
  var sharedContext = {shared_context_json};
  var syncRules = {sync_rules_js};
  var panes = Array.prototype.slice.call(document.querySelectorAll(".pml-pane"));

  function paneBySlot(slot) {{
    return panes.filter(function(p) {{ return Number(p.dataset.slot) === slot; }})[0];
  }}

  function forward(targetWindow, payload) {{
    if (targetWindow) {{
      targetWindow.postMessage(payload, "*");
    }}
  }}

  window.addEventListener("message", function(event) {{
    var msg = event.data;
    if (!msg || typeof msg !== "object") {{ return; }}

    if (msg.method === "ui/initialize") {{
      forward(event.source, {{
        jsonrpc: "2.0",
        id: msg.id,
        result: {{
          protocolVersion: PROTOCOL_VERSION,
          hostCapabilities: {{ sync: true }},
          hostContext: {{
            theme: (window.matchMedia && window.matchMedia("(prefers-color-scheme: dark)").matches) ? "dark" : "light",
            sharedContext: sharedContext
          }}
        }}
      }});
      return;
    }}

    if (msg.method === "ui/update-model-context") {{
      var sourceSlot = panes.reduce(function(acc, p, i) {{
        return p.contentWindow === event.source ? Number(p.dataset.slot) : acc;
      }}, -1);

      syncRules
        .filter(function(rule) {{ return rule.from === sourceSlot && rule.event === (msg.params && msg.params.event); }})
        .forEach(function(rule) {{
          var notification = {{
            jsonrpc: "2.0",
            method: "ui/notifications/tool-result",
            params: {{
              action: rule.action,
              data: msg.params ? msg.params.data : null,
              sourceSlot: sourceSlot,
              sharedContext: sharedContext
            }}
          }};
          if (rule.to === "*") {{
            panes.forEach(function(p) {{
              if (p.contentWindow !== event.source) {{ forward(p.contentWindow, notification); }}
            }});
          }} else {{
            var target = paneBySlot(rule.to);
            if (target) {{ forward(target.contentWindow, notification); }}
          }}
        }});

      if (msg.id !== undefined) {{
        forward(event.source, {{ jsonrpc: "2.0", id: msg.id, result: {{ acknowledged: true }} }});
      }}
    }}
  }});
}})();
</script>
</body>
</html>
"#,
        layout_css = layout_css(descriptor.layout),
        iframes = iframes,
        resource_uri_json = resource_uri_json,
        slot_count = slot_count,
        protocol_version = UI_PROTOCOL_VERSION,
        shared_context_json = shared_context_json,
        sync_rules_js = sync_rules_js,
    )
}

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::ids::ToolId;
    use pml_core::ui::{CollectedUiResource, SyncRule};
    use std::collections::HashMap;

    fn sample_descriptor() -> CompositeUiDescriptor {
        CompositeUiDescriptor {
            layout: Layout::Split,
            children: vec![
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
            ],
            sync_rules: vec![SyncRule {
                from: 0,
                event: "filter".to_string(),
                to: SyncTarget::Slot(1),
                action: "update".to_string(),
            }],
            shared_context: HashMap::new(),
            resource_uri: "ui://pml/workflow/01932abc".to_string(),
        }
    }

    #[test]
    fn renders_one_iframe_per_child_with_slot_and_source() {
        let html = render_html(&sample_descriptor());
        assert!(html.contains("data-slot=\"0\""));
        assert!(html.contains("data-slot=\"1\""));
        assert!(html.contains("data-source=\"postgres:query\""));
        assert!(html.contains("src=\"ui://viz/chart/1\""));
    }

    #[test]
    fn embeds_event_bus_script_and_protocol_version() {
        let html = render_html(&sample_descriptor());
        assert!(html.contains("ui/initialize"));
        assert!(html.contains(UI_PROTOCOL_VERSION));
        assert!(html.contains("ui/notifications/tool-result"));
    }

    #[test]
    fn empty_children_produce_valid_document_with_no_iframes() {
        let mut descriptor = sample_descriptor();
        descriptor.children.clear();
        descriptor.sync_rules.clear();
        let html = render_html(&descriptor);
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(!html.contains("<iframe"));
    }

    #[test]
    fn script_close_tags_in_shared_context_are_neutralized() {
        let mut descriptor = sample_descriptor();
        descriptor
            .shared_context
            .insert("evil".to_string(), serde_json::json!("</script><script>alert(1)"));
        let html = render_html(&descriptor);
        assert!(!html.contains("</script><script>alert"));
    }

    #[test]
    fn is_referentially_transparent() {
        let descriptor = sample_descriptor();
        assert_eq!(render_html(&descriptor), render_html(&descriptor));
    }
}
