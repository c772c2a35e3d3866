//! The top-level JSON-RPC method dispatcher (§4.1): routes one parsed
//! [`RpcRequest`] to its handler and renders the result as either an
//! [`RpcResponse`] or, for notifications (no `id`), nothing at all.
//!
//! Failure policy (§7 "Propagation policy"): only framing-level
//! problems — an unknown method, a malformed `tools/call` shape, the
//! bounded queue being full — surface as JSON-RPC error envelopes.
//! Everything downstream of a successfully-dispatched tool call (a
//! denied tool, an unknown workflow, a bad admin action) is reported as
//! a structured `{status:"error", ...}` body inside a normal MCP
//! `content` envelope, so the host LLM can reason about it.

use std::str::FromStr;

use serde_json::{json, Value};

use pml_capabilities::Scope;
use pml_core::ids::{ToolId, WorkflowId};
use pml_orchestrator::cloud::ExecuteOptions;
use pml_orchestrator::{ExecuteRequest, OrchestratorError};

use crate::execute_wire::{parse_execute_request, render_execute_output};
use crate::health::run_health_checks;
use crate::meta_tools;
use crate::resources::read_ui_resource;
use crate::rpc::{codes, RpcRequest, RpcResponse};
use crate::state::GatewayState;

/// Dispatch one request, returning `None` for notifications (the
/// caller must not write a response line/frame for those).
pub async fn dispatch(state: &GatewayState, request: RpcRequest, session_id: &str) -> Option<RpcResponse> {
    let id = request.id.clone();
    if id.is_none() && request.method.starts_with("notifications/") {
        return None;
    }
    let response_id = id.unwrap_or(Value::Null);

    let outcome = route(state, &request, session_id).await;
    Some(match outcome {
        Ok(result) => RpcResponse::success(response_id, result),
        Err((code, message)) => RpcResponse::error(response_id, code, message),
    })
}

type MethodResult = Result<Value, (i64, String)>;

async fn route(state: &GatewayState, request: &RpcRequest, session_id: &str) -> MethodResult {
    match request.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "tools/list" => Ok(tools_list_result()),
        "tools/call" => tools_call(state, &request.params, session_id).await,
        "resources/read" => resources_read(state, &request.params),
        "prompts/get" => Ok(json!({"description": "", "messages": []})),
        other => Err((codes::METHOD_NOT_FOUND, format!("unknown method: {other}"))),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {}, "prompts": {}, "resources": {}},
        "serverInfo": {"name": "pml-gateway", "version": env!("CARGO_PKG_VERSION")},
    })
}

fn tools_list_result() -> Value {
    let tools: Vec<Value> = meta_tools::meta_tool_descriptors()
        .iter()
        .map(|descriptor| {
            json!({
                "name": descriptor.id.name(),
                "description": descriptor.display_name,
                "inputSchema": descriptor.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn resources_read(state: &GatewayState, params: &Value) -> MethodResult {
    let uri = params
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| (codes::INVALID_PARAMS, "resources/read requires a string \"uri\"".to_string()))?;
    read_ui_resource(&state.ui_registry, uri)
        .ok_or_else(|| (codes::INVALID_PARAMS, format!("unknown resource: {uri}")))
}

/// A `{status:"error", ...}` body wrapped in an MCP content envelope
/// (§7 propagation policy: application errors never become JSON-RPC errors).
fn error_envelope(kind: &str, message: impl Into<String>) -> Value {
    let body = json!({"status": "error", "kind": kind, "message": message.into()});
    json!({"content": [{"type": "text", "text": body.to_string()}]})
}

async fn tools_call(state: &GatewayState, params: &Value, session_id: &str) -> MethodResult {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| (codes::INVALID_PARAMS, "tools/call requires a string \"name\"".to_string()))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let _permit = state
        .concurrency
        .acquire()
        .await
        .map_err(|_| (codes::BACKPRESSURE, "too many in-flight and queued requests".to_string()))?;

    let result = match name {
        "discover" => discover_tool(state, &arguments).await,
        "execute" => execute_tool(state, &arguments, session_id).await,
        "admin" => admin_tool(state, &arguments).await,
        "abort" => abort_tool(state, &arguments).await,
        "replan" => replan_tool(state, &arguments, session_id).await,
        unknown => forward_unknown_tool(state, unknown, arguments).await,
    };
    Ok(result)
}

async fn discover_tool(state: &GatewayState, args: &Value) -> Value {
    let Some(intent) = args.get("intent").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "discover requires \"intent\"");
    };
    let Some(org) = args.get("org").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "discover requires \"org\"");
    };
    let Some(project) = args.get("project").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "discover requires \"project\"");
    };
    let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(10) as usize;

    let scope = Scope { org: org.to_string(), project: project.to_string() };
    match state.capabilities.search_by_intent(intent, &scope, limit).await {
        Ok(ranked) => {
            let candidates: Vec<Value> = ranked
                .into_iter()
                .map(|c| json!({"fqdn": c.fqdn.as_str(), "finalScore": c.final_score}))
                .collect();
            json!({"content": [{"type": "text", "text": json!({"candidates": candidates}).to_string()}]})
        },
        Err(e) => error_envelope("internal", e.to_string()),
    }
}

async fn execute_tool(state: &GatewayState, args: &Value, session_id: &str) -> Value {
    let request = match parse_execute_request(args) {
        Ok(request) => request,
        Err(message) => return error_envelope("invalid_params", message),
    };
    match state.orchestrator.execute(request, session_id).await {
        Ok(output) => render_execute_output(output),
        Err(e) => execute_error_envelope(e),
    }
}

fn execute_error_envelope(error: OrchestratorError) -> Value {
    let kind = match &error {
        OrchestratorError::UnknownWorkflow => "not_found",
        OrchestratorError::CloudForward(_) => "transport",
        OrchestratorError::Sandbox(_) => "runtime",
        OrchestratorError::UnroutableTool(_) => "not_found",
        OrchestratorError::MalformedEnvelope(_) => "invalid_params",
        OrchestratorError::Ui(_) => "internal",
    };
    error_envelope(kind, error.to_string())
}

async fn admin_tool(state: &GatewayState, args: &Value) -> Value {
    let Some(action) = args.get("action").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "admin requires \"action\"");
    };
    match action {
        "list_servers" => {
            let running = state.servers.list_running().await;
            json!({"content": [{"type": "text", "text": json!({"servers": running}).to_string()}]})
        },
        "server_status" => {
            let statuses = state.servers.server_statuses().await;
            json!({"content": [{"type": "text", "text": json!({"statuses": statuses}).to_string()}]})
        },
        "list_pending" => {
            let count = state.pending.len().await;
            json!({"content": [{"type": "text", "text": json!({"pendingCount": count}).to_string()}]})
        },
        "health" => {
            let statuses = state.servers.server_statuses().await;
            let mcp_configured = statuses.len();
            let mcp_running = statuses.iter().filter(|s| s.running).count();
            let sse_connected = state.events.as_ref().map_or(0, |e| e.connected_count());
            let sse_max_clients = state.config.events.max_clients;
            let pending_count = state.pending.len().await;
            let status = run_health_checks(
                mcp_running,
                mcp_configured,
                sse_connected,
                sse_max_clients,
                pending_count,
                state.uptime(),
                env!("CARGO_PKG_VERSION"),
            )
            .await;
            json!({"content": [{"type": "text", "text": serde_json::to_string(&status).unwrap_or_default()}]})
        },
        other => error_envelope("not_found", format!("unknown admin action: {other}")),
    }
}

async fn abort_tool(state: &GatewayState, args: &Value) -> Value {
    let Some(raw_id) = args.get("workflow_id").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "abort requires \"workflow_id\"");
    };
    let Ok(workflow_id) = WorkflowId::from_str(raw_id) else {
        return error_envelope("invalid_params", "workflow_id is not a valid workflow id");
    };
    if state.pending.get(workflow_id).await.is_some() {
        state.pending.delete(workflow_id).await;
        json!({"content": [{"type": "text", "text": json!({"status": "aborted", "workflow_id": workflow_id.to_string()}).to_string()}]})
    } else {
        error_envelope("not_found", "unknown workflow")
    }
}

async fn replan_tool(state: &GatewayState, args: &Value, session_id: &str) -> Value {
    let Some(raw_id) = args.get("workflow_id").and_then(Value::as_str) else {
        return error_envelope("invalid_params", "replan requires \"workflow_id\"");
    };
    let Ok(workflow_id) = WorkflowId::from_str(raw_id) else {
        return error_envelope("invalid_params", "workflow_id is not a valid workflow id");
    };
    state.pending.delete(workflow_id).await;

    let request = ExecuteRequest {
        intent: args.get("intent").and_then(Value::as_str).map(str::to_string),
        code: args.get("code").and_then(Value::as_str).map(str::to_string),
        accept_suggestion: None,
        options: ExecuteOptions::default(),
        continue_workflow: None,
    };
    match state.orchestrator.execute(request, session_id).await {
        Ok(output) => render_execute_output(output),
        Err(e) => execute_error_envelope(e),
    }
}

async fn forward_unknown_tool(state: &GatewayState, name: &str, args: Value) -> Value {
    let tool_id = ToolId::parse(name).unwrap_or_else(|_| ToolId::new("cloud", name));
    match state.orchestrator.forward_unknown_tool_call(&tool_id, args).await {
        Ok(result) => {
            if result.get("content").is_some() {
                result
            } else {
                json!({"content": [{"type": "text", "text": result.to_string()}]})
            }
        },
        Err(e) => execute_error_envelope(e),
    }
}
