//! PML Core - shared data model for the PML gateway.
//!
//! This crate provides:
//! - Newtype identifiers (`WorkflowId`, `CapabilityFqdn`, `ToolId`)
//! - The tool descriptor and routing model
//! - The capability record / alias data model (§4.6)
//! - The pending-workflow entry shape (§4.5)
//! - The adaptive-threshold execution record (§4.8)
//! - The composite-UI data model (§4.9)
//! - The shared error taxonomy (§7)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod alias;
pub mod capability;
pub mod error;
pub mod execution;
pub mod ids;
pub mod tool;
pub mod ui;
pub mod workflow;

pub use alias::Alias;
pub use capability::{CapabilityRecord, Routing, Visibility};
pub use error::{CoreError, CoreResult};
pub use execution::{ExecutionMode, ExecutionRecord, MAX_FINAL_SCORE, final_score, reliability_multiplier};
pub use ids::{CapabilityFqdn, ToolId, WorkflowId};
pub use tool::{PermissionSet, ToolDescriptor};
pub use ui::{
    CollectedUiResource, CompositeUiDescriptor, Layout, OrchestrationConfig, RawSyncTarget, SyncRule, SyncTarget,
    UnresolvedSyncRule,
};
pub use workflow::{ApprovalKind, PendingEntry};
