//! Pending-workflow store error taxonomy.

use thiserror::Error;

/// Errors from the pending-workflow store.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No entry exists for the given workflow id, or it has expired.
    #[error("unknown workflow")]
    UnknownWorkflow,
}

/// Result alias for [`WorkflowError`].
pub type WorkflowResult<T> = Result<T, WorkflowError>;
