//! Permission escalation engine error taxonomy (§4.7).

use thiserror::Error;

/// Errors from parsing a denial message or computing an escalation.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// The operation-classification regex table failed to compile.
    #[error("escalation regex table is malformed: {0}")]
    InvalidPattern(String),
}

/// Result alias for [`EscalationError`].
pub type EscalationResult<T> = Result<T, EscalationError>;
