//! PML Sandbox - isolated subprocess execution of untrusted code (§4.4).
//!
//! Every execution gets a fresh child process with no ambient authority:
//! read access to exactly one wrapped temp file plus an explicit
//! allow-list, no write/network/subprocess/FFI/env. Tool calls made from
//! inside the sandbox cross an RPC bridge back to the orchestrator.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod bridge;
pub mod error;
pub mod executor;
pub mod outcome;
pub mod permissions;
pub mod sanitize;
pub mod wrap;

pub use bridge::{RouteError, RpcBridge, ToolRouter};
pub use error::{SandboxError, SandboxResult};
pub use executor::{SandboxConfig, SandboxExecutor};
pub use outcome::SandboxOutcome;
pub use permissions::SandboxPermissions;
