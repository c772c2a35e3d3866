//! Hybrid execution orchestrator error taxonomy (§4.3, §7).

use thiserror::Error;

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// `continue_workflow` named a workflow id with no live pending entry.
    #[error("unknown workflow")]
    UnknownWorkflow,

    /// The cloud planner could not be reached or returned a malformed response.
    #[error("cloud forward failed: {0}")]
    CloudForward(String),

    /// The sandbox executor failed for reasons other than the user's code throwing.
    #[error(transparent)]
    Sandbox(#[from] pml_sandbox::SandboxError),

    /// A tool call could not be routed (neither a known local server nor cloud-proxyable).
    #[error("no route for tool {0}")]
    UnroutableTool(String),

    /// The cloud's `execute_locally` envelope was missing a required field or malformed.
    #[error("malformed execute_locally envelope: {0}")]
    MalformedEnvelope(String),

    /// The composite UI generator rejected the collected resources.
    #[error(transparent)]
    Ui(#[from] pml_ui::UiError),
}

/// Result alias for [`OrchestratorError`].
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
