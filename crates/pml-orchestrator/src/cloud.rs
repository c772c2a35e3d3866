//! The `CloudPlanner` collaborator boundary (§1 "Out of scope": the
//! cloud planner itself; §6 `execute_locally` envelope).
//!
//! The planning service, its semantic search, and its embedding model
//! live outside this gateway entirely. This module is the narrow trait
//! the orchestrator drives it through, plus an HTTP-backed
//! implementation and a test double.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pml_core::ids::{CapabilityFqdn, ToolId, WorkflowId};
use pml_core::ui::OrchestrationConfig;
use pml_core::workflow::DagTask;

use crate::error::{OrchestratorError, OrchestratorResult};

/// A previously-suggested call the host has chosen to accept (§6
/// `execute` input schema's `accept_suggestion`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptSuggestion {
    /// The suggested capability/call name.
    pub call_name: String,
    /// The arguments to invoke it with.
    pub args: Value,
}

/// Per-call execution options (§6 `execute` input schema's `options`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteOptions {
    /// Caller-requested timeout override, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Whether the cloud should validate the DAG layer-by-layer.
    #[serde(default)]
    pub per_layer_validation: bool,
}

/// A forward request to the cloud planner (the FORWARD_CLOUD transition, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerRequest {
    /// A natural-language intent, if the host supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Pre-written code, if the host supplied it directly instead of an intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// An accepted suggestion from a prior turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_suggestion: Option<AcceptSuggestion>,
    /// Execution options.
    #[serde(default)]
    pub options: ExecuteOptions,
}

/// One entry in `execute_locally.tools_used` (§6): a tool id paired
/// with the capability FQDN the server resolved it to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsage {
    /// The tool id as referenced by the generated code.
    pub id: ToolId,
    /// The resolved capability FQDN.
    pub fqdn: CapabilityFqdn,
}

/// The DAG carried alongside `execute_locally`'s code, if the cloud supplied one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionDag {
    /// The DAG's tasks, each tagged with a layer index.
    #[serde(default)]
    pub tasks: Vec<DagTask>,
}

/// The `execute_locally` envelope (§6), the cloud's instruction to run
/// code in the local sandbox rather than entirely server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteLocallyEnvelope {
    /// The code to run in the sandbox.
    pub code: String,
    /// Tool ids the code may call that route to the client (local MCP).
    #[serde(default)]
    pub client_tools: Vec<ToolId>,
    /// Every tool the code uses, paired with its resolved capability FQDN.
    #[serde(default)]
    pub tools_used: Vec<ToolUsage>,
    /// The workflow id, reused as this execution's trace id.
    pub workflow_id: WorkflowId,
    /// The DAG, if the cloud planned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dag: Option<ExecutionDag>,
    /// Declarative composite-UI orchestration, if the code is expected
    /// to produce more than one UI-bearing tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_orchestration: Option<OrchestrationConfig>,
}

impl ExecuteLocallyEnvelope {
    /// Build the `tool_id -> fqdn` map the sandbox's tool router and the
    /// pending-workflow entry both need.
    #[must_use]
    pub fn tool_fqdn_map(&self) -> HashMap<ToolId, CapabilityFqdn> {
        self.tools_used
            .iter()
            .map(|usage| (usage.id.clone(), usage.fqdn.clone()))
            .collect()
    }
}

/// A suggested call the cloud believes matches the host's intent well
/// enough to surface, but not well enough to run speculatively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedCall {
    /// The suggested capability/call name.
    pub call_name: String,
    /// Suggested arguments.
    pub args: Value,
    /// The cloud's confidence in this suggestion.
    pub confidence: f64,
}

/// Every shape the cloud planner may answer a [`PlannerRequest`] with
/// (§4.3 state machine transitions out of `FORWARD_CLOUD`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlannerResponse {
    /// The cloud executed everything itself; nothing runs locally.
    Success {
        /// The call's result.
        result: Value,
    },
    /// The cloud could not satisfy the request.
    Error {
        /// A human-readable error message.
        message: String,
    },
    /// The cloud proposes a call but wants explicit confirmation.
    Suggestion(SuggestedCall),
    /// The cloud wants the gateway to run code locally (§6).
    ExecuteLocally(ExecuteLocallyEnvelope),
}

/// The remote planning service boundary. Implemented outside this
/// crate in production (`HttpCloudPlanner`); `MockCloudPlanner` stands
/// in for tests.
#[async_trait]
pub trait CloudPlanner: Send + Sync {
    /// Forward one `execute` request to the planner.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::CloudForward`] on transport or
    /// decode failure.
    async fn forward(&self, request: PlannerRequest) -> OrchestratorResult<PlannerResponse>;

    /// Proxy a single tool call declared `server`-routed (§6 routing
    /// resolver) to the cloud on the sandbox's behalf.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::CloudForward`] on transport or
    /// decode failure.
    async fn proxy_tool_call(&self, tool: &ToolId, args: Value) -> OrchestratorResult<Value>;
}

/// Talks to the real cloud planning service over HTTP, authenticated
/// with `PML_API_KEY` (§6 Environment).
pub struct HttpCloudPlanner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCloudPlanner {
    /// Build a planner client pointed at `base_url`, authenticated with `api_key`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Override the default per-request timeout (used by callers that
    /// want to honor `options.timeout_ms` from the `execute` call).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| self.client.clone());
        self
    }
}

#[async_trait]
impl CloudPlanner for HttpCloudPlanner {
    async fn forward(&self, request: PlannerRequest) -> OrchestratorResult<PlannerResponse> {
        let response = self
            .client
            .post(format!("{}/v1/execute", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestratorError::CloudForward(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::CloudForward(format!(
                "cloud planner responded with status {}",
                response.status()
            )));
        }

        response
            .json::<PlannerResponse>()
            .await
            .map_err(|e| OrchestratorError::CloudForward(e.to_string()))
    }

    async fn proxy_tool_call(&self, tool: &ToolId, args: Value) -> OrchestratorResult<Value> {
        let response = self
            .client
            .post(format!("{}/v1/tools/{}/call", self.base_url, tool.as_str()))
            .bearer_auth(&self.api_key)
            .json(&args)
            .send()
            .await
            .map_err(|e| OrchestratorError::CloudForward(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::CloudForward(format!(
                "cloud tool proxy responded with status {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OrchestratorError::CloudForward(e.to_string()))
    }
}

/// A scripted planner response for tests: returns the same response to
/// every call, or an error if none was configured.
pub struct MockCloudPlanner {
    response: Mutex<Option<PlannerResponse>>,
    tool_results: Mutex<HashMap<String, Value>>,
}

impl MockCloudPlanner {
    /// Build a mock that always answers with `response`.
    #[must_use]
    pub fn new(response: PlannerResponse) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            tool_results: Mutex::new(HashMap::new()),
        }
    }

    /// Script a fixed result for a proxied tool call.
    #[must_use]
    pub fn with_tool_result(self, tool: &ToolId, result: Value) -> Self {
        self.tool_results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(tool.as_str().to_string(), result);
        self
    }
}

#[async_trait]
impl CloudPlanner for MockCloudPlanner {
    async fn forward(&self, _request: PlannerRequest) -> OrchestratorResult<PlannerResponse> {
        self.response
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| OrchestratorError::CloudForward("mock planner has no configured response".to_string()))
    }

    async fn proxy_tool_call(&self, tool: &ToolId, _args: Value) -> OrchestratorResult<Value> {
        self.tool_results
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(tool.as_str())
            .cloned()
            .ok_or_else(|| OrchestratorError::CloudForward(format!("mock planner has no result for {tool}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_planner_returns_configured_response() {
        let planner = MockCloudPlanner::new(PlannerResponse::Success { result: serde_json::json!(["a", "b"]) });
        let response = planner
            .forward(PlannerRequest {
                intent: Some("show tools".to_string()),
                code: None,
                accept_suggestion: None,
                options: ExecuteOptions::default(),
            })
            .await
            .unwrap();
        assert!(matches!(response, PlannerResponse::Success { .. }));
    }

    #[test]
    fn execute_locally_builds_tool_fqdn_map() {
        let envelope = ExecuteLocallyEnvelope {
            code: "return 1;".to_string(),
            client_tools: vec![ToolId::new("fs", "read")],
            tools_used: vec![ToolUsage {
                id: ToolId::new("fs", "read"),
                fqdn: CapabilityFqdn::build("alice", "default", "fs", "read", b"return 1;"),
            }],
            workflow_id: WorkflowId::new(),
            dag: None,
            ui_orchestration: None,
        };
        let map = envelope.tool_fqdn_map();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&ToolId::new("fs", "read")));
    }
}
