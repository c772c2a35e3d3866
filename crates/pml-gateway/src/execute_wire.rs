//! Wire-shape conversions for the `execute` meta-tool (§6 `execute`
//! input schema, `approval-required`/`suggestion`/`success`/`error`
//! output shapes). [`pml_orchestrator::ExecuteRequest`] carries no
//! `serde` derives of its own — the orchestrator's internal wire shape
//! toward the cloud planner (`call_name`, snake_case) intentionally
//! differs from the host-facing MCP schema (`callName`, camelCase per
//! §6), so this boundary is hand-mapped rather than derived.

use std::str::FromStr;

use serde_json::{json, Value};

use pml_core::ids::WorkflowId;
use pml_orchestrator::cloud::{AcceptSuggestion, ExecuteOptions};
use pml_orchestrator::{ContinueWorkflow, ExecuteOutput, ExecuteRequest};

/// Parse a `tools/call` `arguments` object into an [`ExecuteRequest`]
/// (§6 `execute` input schema).
///
/// # Errors
///
/// Returns a human-readable message if `continue_workflow.workflow_id`
/// is present but not a valid workflow id.
pub fn parse_execute_request(args: &Value) -> Result<ExecuteRequest, String> {
    let intent = args.get("intent").and_then(Value::as_str).map(str::to_string);
    let code = args.get("code").and_then(Value::as_str).map(str::to_string);

    let accept_suggestion = args.get("accept_suggestion").map(|s| AcceptSuggestion {
        call_name: s.get("callName").and_then(Value::as_str).unwrap_or_default().to_string(),
        args: s.get("args").cloned().unwrap_or(Value::Null),
    });

    let options = args
        .get("options")
        .map(|o| ExecuteOptions {
            timeout_ms: o.get("timeout").and_then(Value::as_u64),
            per_layer_validation: o.get("per_layer_validation").and_then(Value::as_bool).unwrap_or(false),
        })
        .unwrap_or_default();

    let continue_workflow = match args.get("continue_workflow") {
        Some(c) => {
            let raw_id = c.get("workflow_id").and_then(Value::as_str).unwrap_or_default();
            let workflow_id = WorkflowId::from_str(raw_id).map_err(|e| format!("invalid continue_workflow.workflow_id: {e}"))?;
            let approved = c.get("approved").and_then(Value::as_bool).unwrap_or(false);
            Some(ContinueWorkflow { workflow_id, approved })
        },
        None => None,
    };

    Ok(ExecuteRequest {
        intent,
        code,
        accept_suggestion,
        options,
        continue_workflow,
    })
}

/// Render an [`ExecuteOutput`] as the MCP `tools/call` result envelope
/// (§6: `{content:[{type:"text", text:<json>}], _meta?:{ui:...}}`).
#[must_use]
pub fn render_execute_output(output: ExecuteOutput) -> Value {
    match output {
        ExecuteOutput::Success {
            result,
            executed_locally,
            workflow_id,
            ui,
        } => {
            let mut body = json!({
                "status": "success",
                "result": result,
            });
            if executed_locally {
                body["executed_locally"] = json!(true);
            }
            if let Some(workflow_id) = workflow_id {
                body["workflow_id"] = json!(workflow_id.to_string());
            }
            content_envelope(&body, ui)
        },
        ExecuteOutput::Error { message, escalation } => {
            let body = json!({
                "status": "error",
                "message": message,
                "escalation": escalation.map(|e| json!({
                    "currentSet": e.current_set,
                    "requestedSet": e.requested_set,
                    "reason": e.reason,
                    "detectedOperation": e.detected_operation,
                    "confidence": e.confidence,
                })),
            });
            content_envelope(&body, None)
        },
        ExecuteOutput::Suggestion(call) => {
            let body = json!({
                "status": "suggestion",
                "callName": call.call_name,
                "args": call.args,
                "confidence": call.confidence,
            });
            content_envelope(&body, None)
        },
        ExecuteOutput::ApprovalRequired {
            workflow_id,
            approval_kind,
            tool_id,
            payload,
            escalation,
        } => {
            let body = json!({
                "status": "approval_required",
                "approval_type": approval_kind,
                "workflow_id": workflow_id.to_string(),
                "context": {"tool": tool_id.as_str(), "payload": payload},
                "options": ["continue", "abort"],
                "escalation": escalation.map(|e| json!({
                    "currentSet": e.current_set,
                    "requestedSet": e.requested_set,
                    "reason": e.reason,
                    "detectedOperation": e.detected_operation,
                    "confidence": e.confidence,
                })),
            });
            content_envelope(&body, None)
        },
        ExecuteOutput::Aborted => content_envelope(&json!({"status": "aborted"}), None),
    }
}

fn content_envelope(body: &Value, ui: Option<Value>) -> Value {
    let mut envelope = json!({
        "content": [{"type": "text", "text": body.to_string()}],
    });
    if let Some(ui) = ui {
        envelope["_meta"] = json!({"ui": ui});
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_intent() {
        let request = parse_execute_request(&json!({"intent": "list files"})).expect("parses");
        assert_eq!(request.intent.as_deref(), Some("list files"));
        assert!(request.continue_workflow.is_none());
    }

    #[test]
    fn parses_continue_workflow_with_camel_case_accept_suggestion() {
        let id = WorkflowId::new().to_string();
        let request = parse_execute_request(&json!({
            "continue_workflow": {"workflow_id": id, "approved": true},
            "accept_suggestion": {"callName": "fs:read", "args": {"path": "a"}},
        }))
        .expect("parses");
        assert!(request.continue_workflow.expect("present").approved);
        assert_eq!(request.accept_suggestion.expect("present").call_name, "fs:read");
    }

    #[test]
    fn invalid_workflow_id_is_rejected() {
        let result = parse_execute_request(&json!({
            "continue_workflow": {"workflow_id": "not-a-uuid", "approved": true},
        }));
        assert!(result.is_err());
    }

    #[test]
    fn success_output_renders_content_text_and_no_meta() {
        let value = render_execute_output(ExecuteOutput::Success {
            result: json!({"x": 1}),
            executed_locally: false,
            workflow_id: None,
            ui: None,
        });
        assert!(value.get("_meta").is_none());
        assert!(value["content"][0]["text"].as_str().expect("text").contains("\"status\":\"success\""));
    }

    #[test]
    fn single_ui_is_passed_through_in_meta() {
        let value = render_execute_output(ExecuteOutput::Success {
            result: Value::Null,
            executed_locally: true,
            workflow_id: None,
            ui: Some(json!({"resourceUri": "ui://pml/workflow/1"})),
        });
        assert_eq!(value["_meta"]["ui"]["resourceUri"], "ui://pml/workflow/1");
    }
}
