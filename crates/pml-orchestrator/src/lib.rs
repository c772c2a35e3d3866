//! PML Orchestrator - the hybrid execution lifecycle (§4.3).
//!
//! Drives one `execute` call from RECEIVED through FORWARD_CLOUD or
//! RESUME, into LOCAL_RUN when the cloud hands back an `execute_locally`
//! envelope, and on to either DONE or HIL_PAUSE. Every other `pml-*`
//! crate in this workspace is a collaborator this crate wires together
//! rather than reimplements.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod cloud;
pub mod error;
pub mod orchestrator;
pub mod router;
pub mod session;
pub mod ui_collect;
pub mod ui_registry;

pub use cloud::{
    AcceptSuggestion, CloudPlanner, ExecuteLocallyEnvelope, ExecuteOptions, ExecutionDag, HttpCloudPlanner,
    MockCloudPlanner, PlannerRequest, PlannerResponse, SuggestedCall, ToolUsage,
};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{ContinueWorkflow, ExecuteRequest, ExecuteOutput, Orchestrator};
pub use router::ExecutionToolRouter;
pub use session::SessionRegistry;
pub use ui_collect::{classify_collected, default_orchestration, extract_ui_resource, CollectedClass, UiOutcome};
pub use ui_registry::UiRegistry;
