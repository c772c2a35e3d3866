//! The routing resolver (§6): decides, per tool call made from inside
//! the sandbox, whether it is served by a local MCP server or proxied
//! to the cloud, then wires that decision into
//! [`pml_sandbox::bridge::ToolRouter`]. Also collects any `_meta.ui`
//! resource carried on a call's result, in execution order, for the
//! composite UI decision (§4.3 UI handling).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use pml_core::ids::ToolId;
use pml_core::ui::CollectedUiResource;
use pml_core::workflow::ApprovalKind;
use pml_escalation::operation::classify;
use pml_mcp::registry::ServerManager;
use pml_sandbox::bridge::{RouteError, ToolRouter};
use pml_workflow::session::SessionApprovals;

use crate::cloud::CloudPlanner;
use crate::ui_collect::extract_ui_resource;

/// Routes one execution's tool calls: `client_tools` go to the local
/// [`ServerManager`]; everything else is proxied to the cloud (§6).
/// Shared across every call the sandbox makes during one execution, so
/// it doubles as the collector for UI resources surfaced along the way.
pub struct ExecutionToolRouter {
    servers: Arc<ServerManager>,
    planner: Arc<dyn CloudPlanner>,
    client_tools: HashSet<ToolId>,
    session_approvals: Arc<SessionApprovals>,
    collected: Mutex<Vec<CollectedUiResource>>,
    next_slot: AtomicUsize,
}

impl ExecutionToolRouter {
    /// Build a router for one execution, given the cloud's declared
    /// `client_tools` list from the `execute_locally` envelope and the
    /// calling session's prior tool approvals. A local call that fails
    /// with a permission-shaped denial pauses the execution (§4.3
    /// `tool_permission`) the first time; once the session has approved
    /// that tool id, the same denial is reported as a plain failure
    /// instead of pausing again.
    #[must_use]
    pub fn new(
        servers: Arc<ServerManager>,
        planner: Arc<dyn CloudPlanner>,
        client_tools: Vec<ToolId>,
        session_approvals: Arc<SessionApprovals>,
    ) -> Self {
        Self {
            servers,
            planner,
            client_tools: client_tools.into_iter().collect(),
            session_approvals,
            collected: Mutex::new(Vec::new()),
            next_slot: AtomicUsize::new(0),
        }
    }

    /// Every `_meta.ui` resource collected so far, in the order its
    /// originating call completed.
    #[must_use]
    pub fn collected_resources(&self) -> Vec<CollectedUiResource> {
        self.collected.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record_if_ui_bearing(&self, tool_id: &ToolId, result: &Value) {
        let Some(meta) = result.get("_meta") else { return };
        if meta.get("ui").is_none() {
            return;
        }
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        if let Some(resource) = extract_ui_resource(tool_id, Some(meta), slot) {
            self.collected.lock().unwrap_or_else(PoisonError::into_inner).push(resource);
        }
    }
}

/// Turn a failed local tool call into a [`RouteError`]: a permission-shaped
/// denial the session hasn't already cleared becomes a
/// [`RouteError::Pause`] (§4.3 `tool_permission`); anything else, or a
/// denial the session already approved, is a plain failure. Approving a
/// tool does not retroactively make the underlying call succeed — it
/// only stops the router from pausing on it again, so a resumed
/// execution surfaces the call's real outcome once the approved action
/// (credential reload, consent, etc.) has actually taken effect.
fn classify_failure(tool_id: &ToolId, message: String, already_approved: bool) -> RouteError {
    if !already_approved {
        if let Some(classified) = classify(&message) {
            if !classified.kind.is_security_critical() {
                debug!(%tool_id, kind = ?classified.kind, "local tool call denied by permission, pausing");
                return RouteError::Pause {
                    approval_kind: ApprovalKind::ToolPermission,
                    tool_id: tool_id.to_string(),
                    payload: serde_json::json!({"message": message}),
                };
            }
        }
    }
    RouteError::failed(message)
}

#[async_trait]
impl ToolRouter for ExecutionToolRouter {
    async fn route_call(&self, server: &str, tool: &str, args: Value) -> Result<Value, RouteError> {
        let tool_id = ToolId::new(server, tool);

        let result = if self.client_tools.contains(&tool_id) {
            debug!(%tool_id, "routing tool call to local mcp server");
            match self.servers.call_tool(server, tool, args).await {
                Ok(result) => serde_json::json!({"content": result.content, "_meta": result.meta}),
                Err(e) => {
                    let already_approved = self.session_approvals.is_tool_approved(&tool_id).await;
                    return Err(classify_failure(&tool_id, e.to_string(), already_approved));
                }
            }
        } else {
            debug!(%tool_id, "routing tool call to cloud proxy");
            self.planner
                .proxy_tool_call(&tool_id, args)
                .await
                .map_err(|e| RouteError::failed(e.to_string()))?
        };

        self.record_if_ui_bearing(&tool_id, &result);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MockCloudPlanner, PlannerResponse};
    use pml_mcp::config::ServersConfig;

    #[tokio::test]
    async fn non_client_tool_routes_to_cloud_proxy() {
        let servers = Arc::new(ServerManager::new(ServersConfig::default()));
        let tool = ToolId::new("pay", "charge");
        let planner = Arc::new(
            MockCloudPlanner::new(PlannerResponse::Error { message: "unused".to_string() })
                .with_tool_result(&tool, serde_json::json!({"ok": true})),
        );
        let router = ExecutionToolRouter::new(servers, planner, vec![], SessionApprovals::new());
        let result = router.route_call("pay", "charge", serde_json::json!({})).await.unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn client_tool_fails_plainly_when_server_unknown() {
        let servers = Arc::new(ServerManager::new(ServersConfig::default()));
        let planner = Arc::new(MockCloudPlanner::new(PlannerResponse::Error { message: "unused".to_string() }));
        let client_tools = vec![ToolId::new("fs", "read")];
        let router = ExecutionToolRouter::new(servers, planner, client_tools, SessionApprovals::new());
        let result = router.route_call("fs", "read", serde_json::json!({})).await;
        assert!(matches!(result, Err(RouteError::Failed(_))));
    }

    #[test]
    fn permission_denial_pauses_when_not_yet_approved() {
        let tool_id = ToolId::new("pay", "charge");
        let error = classify_failure(
            &tool_id,
            "PermissionDenied: Requires net access to api.example.com:443".to_string(),
            false,
        );
        assert!(matches!(error, RouteError::Pause { approval_kind: ApprovalKind::ToolPermission, .. }));
    }

    #[test]
    fn permission_denial_is_a_plain_failure_once_approved() {
        let tool_id = ToolId::new("pay", "charge");
        let error = classify_failure(
            &tool_id,
            "PermissionDenied: Requires net access to api.example.com:443".to_string(),
            true,
        );
        assert!(matches!(error, RouteError::Failed(_)));
    }

    #[test]
    fn security_critical_denial_never_pauses() {
        let tool_id = ToolId::new("shell", "run");
        let error = classify_failure(&tool_id, "PermissionDenied: Requires run access to /bin/sh".to_string(), false);
        assert!(matches!(error, RouteError::Failed(_)));
    }

    #[test]
    fn unclassified_failure_is_a_plain_failure() {
        let tool_id = ToolId::new("fs", "read");
        let error = classify_failure(&tool_id, "mcp server 'fs' is not running".to_string(), false);
        assert!(matches!(error, RouteError::Failed(_)));
    }

    #[tokio::test]
    async fn ui_bearing_cloud_result_is_collected_in_order() {
        let servers = Arc::new(ServerManager::new(ServersConfig::default()));
        let tool = ToolId::new("viz", "render");
        let planner = Arc::new(
            MockCloudPlanner::new(PlannerResponse::Error { message: "unused".to_string() }).with_tool_result(
                &tool,
                serde_json::json!({"content": [], "_meta": {"ui": {"resourceUri": "ui://viz/1"}}}),
            ),
        );
        let router = ExecutionToolRouter::new(servers, planner, vec![], SessionApprovals::new());
        router.route_call("viz", "render", serde_json::json!({})).await.unwrap();
        let collected = router.collected_resources();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].resource_uri, "ui://viz/1");
        assert_eq!(collected[0].slot, 0);
    }

    #[tokio::test]
    async fn non_ui_result_is_not_collected() {
        let servers = Arc::new(ServerManager::new(ServersConfig::default()));
        let tool = ToolId::new("pay", "charge");
        let planner = Arc::new(
            MockCloudPlanner::new(PlannerResponse::Error { message: "unused".to_string() })
                .with_tool_result(&tool, serde_json::json!({"ok": true})),
        );
        let router = ExecutionToolRouter::new(servers, planner, vec![], SessionApprovals::new());
        router.route_call("pay", "charge", serde_json::json!({})).await.unwrap();
        assert!(router.collected_resources().is_empty());
    }
}
