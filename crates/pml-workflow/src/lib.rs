//! PML Workflow - pending-workflow suspend/resume store (§4.5).
//!
//! Holds correlated, TTL-bounded state between an approval-emitting
//! tool call and its continuation, plus the RESUME pre-action table
//! (§4.3) and session-scoped approval bookkeeping. Process-local by
//! design: a restart loses all pending state and the host must
//! re-initiate.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod resume;
pub mod session;
pub mod store;

pub use error::{WorkflowError, WorkflowResult};
pub use resume::{PreAction, apply_pre_action, read_env_file};
pub use session::SessionApprovals;
pub use store::{DEFAULT_SWEEP_INTERVAL, PendingWorkflowStore, spawn_sweep};
