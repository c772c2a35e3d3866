//! Server configuration for the stdio subprocess client (§4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default per-request timeout (§4.2 `connect()`): 10 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a single MCP server subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The binary to spawn (resolved via `which` if not an absolute path).
    pub command: String,
    /// Arguments passed to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether this server is started automatically at gateway startup.
    #[serde(default)]
    pub auto_start: bool,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Maximum number of automatic restarts after an unexpected exit.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_restarts() -> u32 {
    3
}

impl ServerConfig {
    /// Construct a minimal config for `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            auto_start: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_restarts: default_max_restarts(),
        }
    }
}

/// The set of configured MCP servers, keyed by server id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServersConfig {
    /// Server id -> configuration.
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}
