//! Cross-crate integration tests for the gateway's JSON-RPC surface
//! (§8 "Concrete end-to-end scenarios" 1-3): each test drives
//! `pml_gateway::dispatch::dispatch` the way a real MCP host would,
//! rather than unit-testing an individual collaborator in isolation.
//!
//! Scenarios 4-6 (capability rename, composite UI generation, adaptive
//! threshold) are single-crate properties already covered by their own
//! `#[tokio::test]`s in `pml-capabilities`, `pml-ui`, and `pml-threshold`
//! respectively, so they are not repeated here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use pml_capabilities::{CapabilityRegistry, InMemoryCapabilityStore, NullCapabilitySearch};
use pml_core::ids::{CapabilityFqdn, ToolId, WorkflowId};
use pml_mcp::config::{ServerConfig, ServersConfig};
use pml_mcp::registry::ServerManager;
use pml_orchestrator::{ExecuteLocallyEnvelope, MockCloudPlanner, Orchestrator, PlannerResponse, SessionRegistry, ToolUsage, UiRegistry};
use pml_sandbox::SandboxConfig;
use pml_threshold::ThresholdController;
use pml_workflow::store::PendingWorkflowStore;

use pml_gateway::concurrency::ConcurrencyLimiter;
use pml_gateway::config::GatewayConfig;
use pml_gateway::dispatch::dispatch;
use pml_gateway::rpc::RpcRequest;
use pml_gateway::state::GatewayState;

fn fixture_path() -> String {
    format!("{}/tests/fixtures/fake_mcp_server.py", env!("CARGO_MANIFEST_DIR"))
}

fn fixture_server(tool_name: &str, mode: &str, payload: &str, second_payload: Option<&str>) -> ServerConfig {
    let mut args = vec![fixture_path(), tool_name.to_string(), mode.to_string(), payload.to_string()];
    if let Some(second) = second_payload {
        args.push(second.to_string());
    }
    let mut config = ServerConfig::new("python3");
    config.args = args;
    config
}

/// Build a `GatewayState` wired exactly like production, minus the
/// parts every test scripts itself: the cloud planner and the set of
/// local MCP servers.
fn build_state(planner_response: PlannerResponse, servers_config: ServersConfig) -> (GatewayState, Arc<ServerManager>) {
    let servers = Arc::new(ServerManager::new(servers_config));
    let store = Arc::new(InMemoryCapabilityStore::new());
    let capabilities = Arc::new(CapabilityRegistry::new(store.clone(), store.clone(), Arc::new(NullCapabilitySearch)));
    let pending = PendingWorkflowStore::new();
    let ui_registry = Arc::new(UiRegistry::new());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&servers),
        Arc::new(MockCloudPlanner::new(planner_response)),
        SandboxConfig::default(),
        Arc::clone(&pending),
        Arc::new(SessionRegistry::new()),
        Arc::clone(&capabilities),
        ThresholdController::new(0.85, 0.70),
        Arc::clone(&ui_registry),
        None,
        PathBuf::from("/nonexistent"),
    ));

    let state = GatewayState {
        orchestrator,
        servers: Arc::clone(&servers),
        capabilities,
        pending,
        ui_registry,
        events: None,
        concurrency: Arc::new(ConcurrencyLimiter::new(8, 64)),
        config: GatewayConfig::default(),
        started_at: Instant::now(),
    };
    (state, servers)
}

fn execute_request(id: i64, arguments: Value) -> RpcRequest {
    RpcRequest {
        id: Some(json!(id)),
        method: "tools/call".to_string(),
        params: json!({"name": "execute", "arguments": arguments}),
    }
}

fn response_body(response: &pml_gateway::rpc::RpcResponse) -> Value {
    let rendered = serde_json::to_value(response).expect("response serializes");
    let text = rendered["result"]["content"][0]["text"].as_str().expect("content text");
    serde_json::from_str(text).expect("body is json")
}

/// Scenario 1: cloud success, no local execution at all — the planner
/// answers directly and the sandbox is never touched.
#[tokio::test]
async fn scenario_1_cloud_success_without_local_execution() {
    let (state, _servers) = build_state(PlannerResponse::Success { result: json!(["a", "b"]) }, ServersConfig::default());

    let request = execute_request(1, json!({"intent": "show tools"}));
    let response = dispatch(&state, request, "session-1").await.expect("tools/call answers");
    assert!(!response.is_error());

    let body = response_body(&response);
    assert_eq!(body, json!({"status": "success", "result": ["a", "b"]}));
    assert!(body.get("executed_locally").is_none());
    assert!(body.get("workflow_id").is_none());
}

/// Scenario 2: the cloud hands back an `execute_locally` envelope that
/// calls a local `fs:read` tool; the sandbox runs a real `node` child,
/// routes the call to a real stdio MCP server fixture, and the gateway
/// reports the local result with `executed_locally: true`.
#[tokio::test]
async fn scenario_2_local_hybrid_execution_reports_snake_case_fields() {
    let fs_config = fixture_server("read", "ok", "hello", None);
    let servers_config = ServersConfig { servers: [("fs".to_string(), fs_config)].into_iter().collect() };
    let workflow_id = WorkflowId::new();
    let code = "return await mcp.fs.read({path:'/tmp/x'})".to_string();
    let envelope = ExecuteLocallyEnvelope {
        code: code.clone(),
        client_tools: vec![ToolId::new("fs", "read")],
        tools_used: vec![ToolUsage {
            id: ToolId::new("fs", "read"),
            fqdn: CapabilityFqdn::build("alice", "default", "fs", "read", code.as_bytes()),
        }],
        workflow_id,
        dag: None,
        ui_orchestration: None,
    };

    let (state, servers) = build_state(PlannerResponse::ExecuteLocally(envelope), servers_config);
    servers.start("fs").await.expect("fixture fs server connects");

    let request = execute_request(1, json!({"intent": "read the file"}));
    let response = dispatch(&state, request, "session-2").await.expect("tools/call answers");
    assert!(!response.is_error());

    let body = response_body(&response);
    assert_eq!(body["status"], "success");
    assert_eq!(body["result"], "hello");
    assert_eq!(body["executed_locally"], true);
    assert_eq!(body["workflow_id"], workflow_id.to_string());
}

/// Scenario 3: a local `pay:charge` call is denied for lack of network
/// access, which pauses the workflow for human approval; resuming with
/// `continue_workflow.approved = true` re-runs the stored code, and the
/// now-approved call succeeds.
#[tokio::test]
async fn scenario_3_hil_permission_pause_and_resume() {
    let pay_config = fixture_server(
        "charge",
        "err_once",
        "PermissionDenied: Requires net access to api.example.com:443",
        Some(r#"{"charged": true}"#),
    );
    let servers_config = ServersConfig { servers: [("pay".to_string(), pay_config)].into_iter().collect() };
    let workflow_id = WorkflowId::new();
    let code = "return await mcp.pay.charge({amount: 10})".to_string();
    let envelope = ExecuteLocallyEnvelope {
        code: code.clone(),
        client_tools: vec![ToolId::new("pay", "charge")],
        tools_used: vec![ToolUsage {
            id: ToolId::new("pay", "charge"),
            fqdn: CapabilityFqdn::build("alice", "default", "pay", "charge", code.as_bytes()),
        }],
        workflow_id,
        dag: None,
        ui_orchestration: None,
    };

    let (state, servers) = build_state(PlannerResponse::ExecuteLocally(envelope), servers_config);
    servers.start("pay").await.expect("fixture pay server connects");

    let first = execute_request(1, json!({"intent": "charge the card"}));
    let first_response = dispatch(&state, first, "session-3").await.expect("tools/call answers");
    assert!(!first_response.is_error());

    let paused = response_body(&first_response);
    assert_eq!(paused["status"], "approval_required");
    assert_eq!(paused["approval_type"], "tool_permission");
    assert_eq!(paused["workflow_id"], workflow_id.to_string());
    assert_eq!(paused["context"]["tool"], "pay:charge");
    assert_eq!(paused["options"], json!(["continue", "abort"]));
    assert!(state.pending.get(workflow_id).await.is_some());

    let resume = execute_request(
        2,
        json!({"continue_workflow": {"workflow_id": workflow_id.to_string(), "approved": true}}),
    );
    let resume_response = dispatch(&state, resume, "session-3").await.expect("tools/call answers");
    assert!(!resume_response.is_error());

    let resumed = response_body(&resume_response);
    assert_eq!(resumed["status"], "success");
    assert_eq!(resumed["result"], json!({"charged": true}));
    assert!(state.pending.get(workflow_id).await.is_none(), "pending entry must be gone after resume");
}
