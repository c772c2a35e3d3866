//! The hybrid execution orchestrator (§4.3): the `execute` lifecycle
//! state machine — RECEIVED, RESUME/FORWARD_CLOUD, LOCAL_RUN, HIL_PAUSE,
//! DONE — wired to every collaborating crate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use pml_capabilities::CapabilityRegistry;
use pml_core::execution::{ExecutionMode, ExecutionRecord};
use pml_core::ids::{CapabilityFqdn, ToolId, WorkflowId};
use pml_core::tool::PermissionSet;
use pml_core::ui::OrchestrationConfig;
use pml_core::workflow::{ApprovalKind, DagTask, PendingEntry, DEFAULT_TTL};
use pml_escalation::{suggest_escalation, EscalationSuggestion};
use pml_events::{EventMessage, EventStreamManager};
use pml_mcp::registry::ServerManager;
use pml_sandbox::bridge::ToolRouter;
use pml_sandbox::{SandboxConfig, SandboxError, SandboxExecutor, SandboxOutcome};
use pml_threshold::ThresholdController;
use pml_workflow::resume::{apply_pre_action as workflow_apply_pre_action, read_env_file, PreAction};
use pml_workflow::session::SessionApprovals;
use pml_workflow::store::PendingWorkflowStore;

use crate::cloud::{AcceptSuggestion, CloudPlanner, ExecuteLocallyEnvelope, ExecuteOptions, PlannerRequest, PlannerResponse, SuggestedCall};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::router::ExecutionToolRouter;
use crate::session::SessionRegistry;
use crate::ui_collect::{classify_collected, default_orchestration, CollectedClass};
use crate::ui_registry::UiRegistry;

/// One `execute` call's input (§6 `execute` input schema).
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// A natural-language intent, if the host supplied one.
    pub intent: Option<String>,
    /// Pre-written code, if the host supplied it directly.
    pub code: Option<String>,
    /// An accepted suggestion from a prior turn.
    pub accept_suggestion: Option<AcceptSuggestion>,
    /// Execution options.
    pub options: ExecuteOptions,
    /// A resume instruction, present only when this call continues a
    /// previously-paused workflow (§4.3 RESUME transition).
    pub continue_workflow: Option<ContinueWorkflow>,
}

/// The host's decision on a paused workflow (§6 `continue_workflow` field).
#[derive(Debug, Clone)]
pub struct ContinueWorkflow {
    /// Which paused workflow this decision applies to.
    pub workflow_id: WorkflowId,
    /// Whether the human approved continuing.
    pub approved: bool,
}

/// The result of one `execute` call (§4.3 DONE transition, §6 output shapes).
#[derive(Debug, Clone)]
pub enum ExecuteOutput {
    /// The call completed, either entirely in the cloud or after a local run.
    Success {
        /// The call's result value.
        result: Value,
        /// Whether a local sandbox run produced this result.
        executed_locally: bool,
        /// The workflow id, if this was a local run.
        workflow_id: Option<WorkflowId>,
        /// The `_meta.ui` object the caller should attach to the MCP
        /// tool result, per the 0/1/≥2 rule (§4.3 UI handling).
        ui: Option<Value>,
    },
    /// The call failed outright.
    Error {
        /// A human-readable error message.
        message: String,
        /// A minimal permission escalation that would unblock the
        /// failure, if one could be derived (§4.7).
        escalation: Option<EscalationSuggestion>,
    },
    /// The cloud proposes a call but wants explicit confirmation.
    Suggestion(SuggestedCall),
    /// Execution paused on a human-in-the-loop approval (§4.5, §6).
    ApprovalRequired {
        /// The workflow id to resume with `continue_workflow`.
        workflow_id: WorkflowId,
        /// What kind of approval is needed.
        approval_kind: ApprovalKind,
        /// The tool call that triggered the pause.
        tool_id: ToolId,
        /// Kind-specific payload, passed through for the host to render.
        payload: Value,
        /// A minimal permission escalation, if this pause was a
        /// `tool_permission` denial the engine could classify (§4.7).
        escalation: Option<EscalationSuggestion>,
    },
    /// The host declined to continue a paused workflow.
    Aborted,
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

struct LocalRunContext {
    workflow_id: WorkflowId,
    code: String,
    tool_fqdn_map: HashMap<ToolId, CapabilityFqdn>,
    dag_tasks: Vec<DagTask>,
    ui_orchestration: Option<OrchestrationConfig>,
    session_id: String,
    accepted_call_name: Option<String>,
    started: Instant,
}

/// Drives the `execute` lifecycle (§4.3), owning or sharing every
/// collaborator the state machine touches.
pub struct Orchestrator {
    servers: Arc<ServerManager>,
    planner: Arc<dyn CloudPlanner>,
    sandbox_config: SandboxConfig,
    pending: Arc<PendingWorkflowStore>,
    sessions: Arc<SessionRegistry>,
    capabilities: Arc<CapabilityRegistry>,
    threshold: ThresholdController,
    ui_registry: Arc<UiRegistry>,
    events: Option<Arc<EventStreamManager>>,
    workspace_root: PathBuf,
    reloaded_env: RwLock<HashMap<String, String>>,
    session_approvals: DashMap<String, Arc<SessionApprovals>>,
}

impl Orchestrator {
    /// Build an orchestrator over its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        servers: Arc<ServerManager>,
        planner: Arc<dyn CloudPlanner>,
        sandbox_config: SandboxConfig,
        pending: Arc<PendingWorkflowStore>,
        sessions: Arc<SessionRegistry>,
        capabilities: Arc<CapabilityRegistry>,
        threshold: ThresholdController,
        ui_registry: Arc<UiRegistry>,
        events: Option<Arc<EventStreamManager>>,
        workspace_root: PathBuf,
    ) -> Self {
        Self {
            servers,
            planner,
            sandbox_config,
            pending,
            sessions,
            capabilities,
            threshold,
            ui_registry,
            events,
            workspace_root,
            reloaded_env: RwLock::new(HashMap::new()),
            session_approvals: DashMap::new(),
        }
    }

    /// Environment variables most recently re-read from the workspace
    /// env file by an `api_key_required`/`oauth_connect` resume (§4.3).
    pub async fn reloaded_env_vars(&self) -> HashMap<String, String> {
        self.reloaded_env.read().await.clone()
    }

    /// Forward a `tools/call` naming something other than a PML
    /// meta-tool straight to the cloud, unchanged (§4.1 "Unknown tools
    /// forward to cloud unchanged").
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::CloudForward`] if the cloud cannot
    /// be reached or answers with a malformed body.
    pub async fn forward_unknown_tool_call(&self, tool_id: &ToolId, args: Value) -> OrchestratorResult<Value> {
        self.planner.proxy_tool_call(tool_id, args).await
    }

    /// The capability registry this orchestrator resolves and records
    /// usage against, exposed for the gateway's `discover` meta-tool.
    #[must_use]
    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// The pending-workflow store, exposed for the gateway's
    /// `abort`/`admin` meta-tools.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingWorkflowStore> {
        &self.pending
    }

    /// The configured MCP server registry, exposed for the gateway's
    /// `admin` meta-tool and health checks.
    #[must_use]
    pub fn servers(&self) -> &Arc<ServerManager> {
        &self.servers
    }

    fn session_approvals(&self, session_id: &str) -> Arc<SessionApprovals> {
        Arc::clone(&self.session_approvals.entry(session_id.to_string()).or_insert_with(SessionApprovals::new))
    }

    /// Drive one `execute` call through the RECEIVED transition (§4.3):
    /// either RESUME a paused workflow or FORWARD_CLOUD a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] if the cloud forward, sandbox run,
    /// or composite UI assembly fails; a failure of the *user's code* is
    /// reported as `Ok(ExecuteOutput::Error)`, not an `Err`.
    pub async fn execute(&self, request: ExecuteRequest, session_id: &str) -> OrchestratorResult<ExecuteOutput> {
        if let Some(continuation) = request.continue_workflow {
            return self.resume(continuation, session_id).await;
        }
        self.forward(request, session_id).await
    }

    async fn settle_suggestion(&self, session_id: &str, call_name: Option<&str>, success: bool, elapsed: Duration) {
        let Some(call_name) = call_name else { return };
        let Some(confidence) = self.sessions.take_suggestion_confidence(session_id, call_name) else {
            return;
        };
        let record = ExecutionRecord::new(confidence, ExecutionMode::Suggestion, success, Some(true), duration_ms(elapsed));
        self.threshold.record(record).await;
    }

    async fn forward(&self, request: ExecuteRequest, session_id: &str) -> OrchestratorResult<ExecuteOutput> {
        let accepted_call_name = request.accept_suggestion.as_ref().map(|a| a.call_name.clone());
        let started = Instant::now();

        let planner_request = PlannerRequest {
            intent: request.intent,
            code: request.code,
            accept_suggestion: request.accept_suggestion,
            options: request.options,
        };
        let response = self.planner.forward(planner_request).await?;

        match response {
            PlannerResponse::Success { result } => {
                self.settle_suggestion(session_id, accepted_call_name.as_deref(), true, started.elapsed()).await;
                Ok(ExecuteOutput::Success { result, executed_locally: false, workflow_id: None, ui: None })
            },
            PlannerResponse::Error { message } => {
                self.settle_suggestion(session_id, accepted_call_name.as_deref(), false, started.elapsed()).await;
                Ok(ExecuteOutput::Error { message, escalation: None })
            },
            PlannerResponse::Suggestion(suggested) => {
                self.sessions.record_suggestion(session_id, &suggested.call_name, suggested.confidence);
                Ok(ExecuteOutput::Suggestion(suggested))
            },
            PlannerResponse::ExecuteLocally(envelope) => {
                let ctx = LocalRunContext {
                    workflow_id: envelope.workflow_id,
                    code: envelope.code.clone(),
                    tool_fqdn_map: envelope.tool_fqdn_map(),
                    dag_tasks: envelope.dag.clone().map(|d| d.tasks).unwrap_or_default(),
                    ui_orchestration: envelope.ui_orchestration.clone(),
                    session_id: session_id.to_string(),
                    accepted_call_name,
                    started,
                };
                self.run_locally(envelope.code, envelope.client_tools, ctx).await
            },
        }
    }

    /// RESUME a paused workflow (§4.3, §6 `continue_workflow`).
    async fn resume(&self, continuation: ContinueWorkflow, session_id: &str) -> OrchestratorResult<ExecuteOutput> {
        let entry = self
            .pending
            .get(continuation.workflow_id)
            .await
            .ok_or(OrchestratorError::UnknownWorkflow)?;
        self.pending.delete(continuation.workflow_id).await;

        if !continuation.approved {
            return Ok(ExecuteOutput::Aborted);
        }

        self.apply_pre_action(&entry, session_id).await;

        let started = Instant::now();
        let client_tools: Vec<ToolId> = entry.tool_fqdn_map.keys().cloned().collect();
        let ctx = LocalRunContext {
            workflow_id: entry.workflow_id,
            code: entry.code.clone(),
            tool_fqdn_map: entry.tool_fqdn_map,
            dag_tasks: entry.dag_tasks,
            ui_orchestration: None,
            session_id: session_id.to_string(),
            accepted_call_name: None,
            started,
        };
        self.run_locally(entry.code, client_tools, ctx).await
    }

    async fn apply_pre_action(&self, entry: &PendingEntry, session_id: &str) {
        let approvals = self.session_approvals(session_id);
        let pre_action =
            workflow_apply_pre_action(entry.approval_kind, &entry.originating_tool, &entry.payload, &approvals).await;

        if pre_action == PreAction::ReloadEnvFile {
            match read_env_file(&self.workspace_root).await {
                Ok(vars) => {
                    self.reloaded_env.write().await.extend(vars);
                },
                Err(e) => warn!(error = %e, "failed to reload workspace env file on resume"),
            }
        }
    }

    async fn run_locally(&self, code: String, client_tools: Vec<ToolId>, ctx: LocalRunContext) -> OrchestratorResult<ExecuteOutput> {
        let session_approvals = self.session_approvals(&ctx.session_id);
        let router = Arc::new(ExecutionToolRouter::new(
            Arc::clone(&self.servers),
            Arc::clone(&self.planner),
            client_tools,
            session_approvals,
        ));
        let executor = SandboxExecutor::new(self.sandbox_config.clone(), Arc::clone(&router) as Arc<dyn ToolRouter>);
        let outcome = executor.execute(HashMap::new(), &code).await?;
        self.handle_outcome(outcome, &router, ctx).await
    }

    async fn handle_outcome(
        &self,
        outcome: SandboxOutcome,
        router: &ExecutionToolRouter,
        ctx: LocalRunContext,
    ) -> OrchestratorResult<ExecuteOutput> {
        match outcome {
            SandboxOutcome::Completed { result } => self.handle_completed(result, router, ctx).await,
            SandboxOutcome::Paused { approval_kind, tool_id, payload } => {
                self.handle_paused(approval_kind, tool_id, payload, ctx).await
            },
            SandboxOutcome::Failed { error } => self.handle_failed(error, ctx).await,
        }
    }

    async fn handle_completed(
        &self,
        result: Value,
        router: &ExecutionToolRouter,
        ctx: LocalRunContext,
    ) -> OrchestratorResult<ExecuteOutput> {
        self.settle_suggestion(&ctx.session_id, ctx.accepted_call_name.as_deref(), true, ctx.started.elapsed()).await;

        let latency_ms = duration_ms(ctx.started.elapsed());
        for fqdn in ctx.tool_fqdn_map.values() {
            if let Err(e) = self.capabilities.record_usage(fqdn, true, latency_ms).await {
                warn!(fqdn = %fqdn, error = %e, "failed to record capability usage after successful execution");
            }
        }

        let collected = router.collected_resources();
        let ui = match classify_collected(&collected) {
            CollectedClass::None => None,
            CollectedClass::Single(resource) => Some(serde_json::json!({
                "resourceUri": resource.resource_uri,
                "context": resource.context,
            })),
            CollectedClass::Composite => {
                let orchestration = ctx.ui_orchestration.clone().unwrap_or_else(default_orchestration);
                let (descriptor, html) = pml_ui::build_composite_ui(ctx.workflow_id, &collected, &orchestration)?;
                self.ui_registry.register(descriptor.resource_uri.clone(), html);
                Some(serde_json::json!({ "resourceUri": descriptor.resource_uri }))
            },
        };

        if let Some(events) = &self.events {
            events.broadcast(EventMessage::new(
                "tool_result",
                serde_json::json!({ "workflowId": ctx.workflow_id, "result": &result }),
            ));
        }

        Ok(ExecuteOutput::Success {
            result,
            executed_locally: true,
            workflow_id: Some(ctx.workflow_id),
            ui,
        })
    }

    async fn handle_paused(
        &self,
        approval_kind: ApprovalKind,
        tool_id: ToolId,
        payload: Value,
        ctx: LocalRunContext,
    ) -> OrchestratorResult<ExecuteOutput> {
        let entry = PendingEntry {
            workflow_id: ctx.workflow_id,
            code: ctx.code,
            originating_tool: tool_id.clone(),
            approval_kind,
            payload: payload.clone(),
            tool_fqdn_map: ctx.tool_fqdn_map,
            dag_tasks: ctx.dag_tasks,
            created_at: Utc::now(),
            ttl: DEFAULT_TTL,
        };
        self.pending.set_with_id(ctx.workflow_id, entry).await;

        let escalation = if approval_kind == ApprovalKind::ToolPermission {
            payload
                .get("message")
                .and_then(Value::as_str)
                .and_then(|message| suggest_escalation(message, PermissionSet::Minimal))
        } else {
            None
        };

        if let Some(events) = &self.events {
            events.broadcast(EventMessage::new(
                "approval_required",
                serde_json::json!({ "workflowId": ctx.workflow_id, "approvalKind": approval_kind, "toolId": tool_id }),
            ));
        }

        Ok(ExecuteOutput::ApprovalRequired {
            workflow_id: ctx.workflow_id,
            approval_kind,
            tool_id,
            payload,
            escalation,
        })
    }

    async fn handle_failed(&self, error: SandboxError, ctx: LocalRunContext) -> OrchestratorResult<ExecuteOutput> {
        self.settle_suggestion(&ctx.session_id, ctx.accepted_call_name.as_deref(), false, ctx.started.elapsed()).await;

        let latency_ms = duration_ms(ctx.started.elapsed());
        for fqdn in ctx.tool_fqdn_map.values() {
            if let Err(e) = self.capabilities.record_usage(fqdn, false, latency_ms).await {
                warn!(fqdn = %fqdn, error = %e, "failed to record capability usage after failed execution");
            }
        }

        let escalation = match &error {
            SandboxError::PermissionError(message) => suggest_escalation(message, PermissionSet::Minimal),
            _ => None,
        };

        Ok(ExecuteOutput::Error { message: error.to_string(), escalation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{MockCloudPlanner, ToolUsage};
    use pml_capabilities::{CapabilityRegistry, InMemoryCapabilityStore, NullCapabilitySearch};
    use pml_mcp::config::ServersConfig;

    fn orchestrator(response: PlannerResponse) -> Orchestrator {
        let store = Arc::new(InMemoryCapabilityStore::new());
        let capabilities = Arc::new(CapabilityRegistry::new(store.clone(), store.clone(), Arc::new(NullCapabilitySearch)));
        Orchestrator::new(
            Arc::new(ServerManager::new(ServersConfig::default())),
            Arc::new(MockCloudPlanner::new(response)),
            SandboxConfig { runtime_binary: "true".to_string(), ..SandboxConfig::default() },
            PendingWorkflowStore::new(),
            Arc::new(SessionRegistry::new()),
            capabilities,
            ThresholdController::new(0.85, 0.70),
            Arc::new(UiRegistry::new()),
            None,
            PathBuf::from("/nonexistent"),
        )
    }

    #[tokio::test]
    async fn cloud_success_short_circuits_the_sandbox() {
        let orch = orchestrator(PlannerResponse::Success { result: serde_json::json!(42) });
        let request = ExecuteRequest {
            intent: Some("compute".to_string()),
            code: None,
            accept_suggestion: None,
            options: ExecuteOptions::default(),
            continue_workflow: None,
        };
        let output = orch.execute(request, "session-a").await.unwrap();
        match output {
            ExecuteOutput::Success { result, executed_locally, .. } => {
                assert_eq!(result, serde_json::json!(42));
                assert!(!executed_locally);
            },
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cloud_error_is_reported_without_escalation() {
        let orch = orchestrator(PlannerResponse::Error { message: "no capability matched".to_string() });
        let request = ExecuteRequest {
            intent: Some("do the impossible".to_string()),
            code: None,
            accept_suggestion: None,
            options: ExecuteOptions::default(),
            continue_workflow: None,
        };
        let output = orch.execute(request, "session-a").await.unwrap();
        assert!(matches!(output, ExecuteOutput::Error { escalation: None, .. }));
    }

    #[tokio::test]
    async fn cloud_suggestion_is_cached_for_later_settlement() {
        let orch = orchestrator(PlannerResponse::Suggestion(SuggestedCall {
            call_name: "fs:read".to_string(),
            args: serde_json::json!({}),
            confidence: 0.81,
        }));
        let request = ExecuteRequest {
            intent: Some("read a file".to_string()),
            code: None,
            accept_suggestion: None,
            options: ExecuteOptions::default(),
            continue_workflow: None,
        };
        let output = orch.execute(request, "session-a").await.unwrap();
        assert!(matches!(output, ExecuteOutput::Suggestion(_)));
        assert_eq!(orch.sessions.take_suggestion_confidence("session-a", "fs:read"), Some(0.81));
    }

    #[tokio::test]
    async fn resume_on_unknown_workflow_is_an_error() {
        let orch = orchestrator(PlannerResponse::Error { message: "unused".to_string() });
        let request = ExecuteRequest {
            intent: None,
            code: None,
            accept_suggestion: None,
            options: ExecuteOptions::default(),
            continue_workflow: Some(ContinueWorkflow { workflow_id: WorkflowId::new(), approved: true }),
        };
        let result = orch.execute(request, "session-a").await;
        assert!(matches!(result, Err(OrchestratorError::UnknownWorkflow)));
    }

    #[tokio::test]
    async fn declining_a_pending_workflow_aborts_it() {
        let orch = orchestrator(PlannerResponse::Error { message: "unused".to_string() });
        let workflow_id = WorkflowId::new();
        orch.pending
            .set_with_id(
                workflow_id,
                PendingEntry {
                    workflow_id,
                    code: "return 1;".to_string(),
                    originating_tool: ToolId::new("pay", "charge"),
                    approval_kind: ApprovalKind::ToolPermission,
                    payload: serde_json::json!({}),
                    tool_fqdn_map: HashMap::new(),
                    dag_tasks: Vec::new(),
                    created_at: Utc::now(),
                    ttl: DEFAULT_TTL,
                },
            )
            .await;
        let request = ExecuteRequest {
            intent: None,
            code: None,
            accept_suggestion: None,
            options: ExecuteOptions::default(),
            continue_workflow: Some(ContinueWorkflow { workflow_id, approved: false }),
        };
        let output = orch.execute(request, "session-a").await.unwrap();
        assert!(matches!(output, ExecuteOutput::Aborted));
        assert!(orch.pending.get(workflow_id).await.is_none());
    }

    #[test]
    fn tool_usage_field_is_constructible() {
        // Exercises the cloud envelope type this module consumes, so a
        // reviewer can see the shape without chasing into `cloud.rs`.
        let _usage = ToolUsage {
            id: ToolId::new("fs", "read"),
            fqdn: CapabilityFqdn::build("alice", "default", "fs", "read", b"return 1;"),
        };
    }
}
