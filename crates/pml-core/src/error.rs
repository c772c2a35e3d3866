//! Shared error taxonomy for the PML gateway (§7).

use thiserror::Error;

/// Errors produced by the shared data model — malformed identifiers,
/// schema validation, and the invariants checked at construction time.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A capability FQDN did not match
    /// `^[a-z0-9_-]+\.[a-z0-9_-]+\.[a-z0-9_-]+\.[a-z0-9_-]+\.[a-f0-9]{4}$`.
    #[error("invalid capability fqdn: {0}")]
    InvalidFqdn(String),

    /// A context-binding name did not match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid context binding name: {0}")]
    InvalidContext(String),

    /// A tool id did not match the `server:name` shape.
    #[error("invalid tool id: {0}")]
    InvalidToolId(String),

    /// A UUID string failed to parse.
    #[error("invalid workflow id: {0}")]
    InvalidWorkflowId(String),
}

/// Result alias for [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
