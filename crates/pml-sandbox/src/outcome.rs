//! Typed execution outcomes (§4.4, §9 redesign: exceptions-as-control-flow
//! replaced with an explicit result type).
//!
//! The original design used thrown JS errors to signal "this call needs
//! human approval" as well as genuine failures, conflating the two. Here
//! a paused-for-approval execution is a distinct, first-class outcome
//! rather than an error variant.

use serde_json::Value;

use pml_core::workflow::ApprovalKind;
use pml_core::ids::ToolId;

use crate::error::SandboxError;

/// The result of driving one sandboxed execution to completion.
#[derive(Debug, Clone)]
pub enum SandboxOutcome {
    /// The code ran to completion and produced a result value.
    Completed {
        /// The normalized result (`undefined` becomes `null`).
        result: Value,
    },
    /// Execution suspended because a tool call required human approval.
    ///
    /// The orchestrator persists a [`pml_core::workflow::PendingEntry`]
    /// keyed by the enclosing workflow id and resumes the sandbox (or a
    /// fresh one with the same context) once the approval resolves.
    Paused {
        /// Why approval is required.
        approval_kind: ApprovalKind,
        /// The tool call that triggered the pause.
        tool_id: ToolId,
        /// The arguments the paused call was invoked with.
        payload: Value,
    },
    /// Execution failed.
    Failed {
        /// The sanitized error.
        error: SandboxError,
    },
}

impl SandboxOutcome {
    /// True if this outcome represents a successful completion.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, SandboxOutcome::Completed { .. })
    }

    /// True if this outcome is a suspended, resumable pause.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        matches!(self, SandboxOutcome::Paused { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_reports_its_own_kind() {
        let outcome = SandboxOutcome::Completed { result: Value::Null };
        assert!(outcome.is_completed());
        assert!(!outcome.is_paused());
    }
}
