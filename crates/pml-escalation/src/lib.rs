//! PML Escalation - the permission escalation engine (§4.7).
//!
//! Parses a sandbox denial message produced when local policy blocked a
//! tool call, classifies the attempted operation against a fixed
//! regex table, and proposes the minimal permission-set escalation that
//! would unblock it via the directed escalation graph. Security-critical
//! operations (`run`, `ffi`) never auto-escalate.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod graph;
pub mod operation;

pub use engine::{suggest_escalation, EscalationSuggestion};
pub use error::{EscalationError, EscalationResult};
pub use operation::{classify, Classified, OperationKind};
