//! PML MCP - a hand-rolled MCP stdio subprocess client (§4.2).
//!
//! Unlike most of this gateway's machinery, this crate does not lean on
//! an external MCP SDK: framing, stderr multiplexing, request-id
//! correlation and per-request timeouts are engineering surface the
//! specification calls out explicitly, so they are implemented directly
//! here rather than delegated.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod transport;
pub mod types;

pub use client::McpClient;
pub use config::{ServerConfig, ServersConfig};
pub use error::{McpError, McpResult};
pub use registry::ServerManager;
pub use transport::StdioTransport;
pub use types::{McpServerStatus, MethodCall, ToolCallResult};
