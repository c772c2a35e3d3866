//! Multi-server registry: start/stop/restart and status snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::client::McpClient;
use crate::config::{ServerConfig, ServersConfig};
use crate::error::{McpError, McpResult};
use crate::types::{McpServerStatus, ToolCallResult};

struct ManagedServer {
    client: Mutex<McpClient>,
    restart_count: std::sync::atomic::AtomicU32,
}

/// Owns the lifetime of every configured MCP server subprocess.
///
/// All connection state lives behind short-held locks; no lock is ever
/// held across the `.await` points inside an individual server's
/// request/response round-trip (the per-server mutex guards only the
/// `McpClient` handle itself).
pub struct ServerManager {
    servers: RwLock<HashMap<String, Arc<ManagedServer>>>,
}

impl ServerManager {
    /// Build a manager from a full server configuration set.
    #[must_use]
    pub fn new(config: ServersConfig) -> Self {
        let servers = config
            .servers
            .into_iter()
            .map(|(name, cfg)| {
                let managed = Arc::new(ManagedServer {
                    client: Mutex::new(McpClient::new(name.clone(), cfg)),
                    restart_count: std::sync::atomic::AtomicU32::new(0),
                });
                (name, managed)
            })
            .collect();
        Self {
            servers: RwLock::new(servers),
        }
    }

    /// An empty manager with no configured servers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new server dynamically.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ServerAlreadyExists`] if `name` is already registered.
    pub async fn add_server(&self, name: &str, config: ServerConfig) -> McpResult<()> {
        let mut servers = self.servers.write().await;
        if servers.contains_key(name) {
            return Err(McpError::ServerAlreadyExists {
                name: name.to_string(),
            });
        }
        servers.insert(
            name.to_string(),
            Arc::new(ManagedServer {
                client: Mutex::new(McpClient::new(name, config)),
                restart_count: std::sync::atomic::AtomicU32::new(0),
            }),
        );
        Ok(())
    }

    async fn lookup(&self, name: &str) -> McpResult<Arc<ManagedServer>> {
        let servers = self.servers.read().await;
        servers
            .get(name)
            .cloned()
            .ok_or_else(|| McpError::ServerNotRunning {
                name: name.to_string(),
            })
    }

    /// Start and connect a server by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown or fails to connect.
    pub async fn start(&self, name: &str) -> McpResult<()> {
        let managed = self.lookup(name).await?;
        let mut client = managed.client.lock().await;
        if client.is_connected() {
            return Ok(());
        }
        client.connect().await
    }

    /// Whether a server is currently connected.
    pub async fn is_running(&self, name: &str) -> bool {
        match self.lookup(name).await {
            Ok(managed) => managed.client.lock().await.is_connected(),
            Err(_) => false,
        }
    }

    /// Stop (disconnect) a server. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown.
    pub async fn stop(&self, name: &str) -> McpResult<()> {
        let managed = self.lookup(name).await?;
        managed.client.lock().await.close().await
    }

    /// Stop every configured server.
    ///
    /// # Errors
    ///
    /// Returns an error only if a shutdown-safe close somehow fails; in
    /// practice close is infallible beyond process-kill races.
    pub async fn stop_all(&self) -> McpResult<()> {
        let servers = self.servers.read().await;
        for managed in servers.values() {
            if let Err(e) = managed.client.lock().await.close().await {
                warn!(error = %e, "error stopping mcp server during shutdown");
            }
        }
        Ok(())
    }

    /// Stop then start a server.
    ///
    /// # Errors
    ///
    /// Returns an error if reconnection fails.
    pub async fn restart(&self, name: &str) -> McpResult<()> {
        let managed = self.lookup(name).await?;
        managed.restart_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut client = managed.client.lock().await;
        let _ = client.close().await;
        client.connect().await
    }

    /// Restart only if the server's configured restart budget is not
    /// exhausted. Returns `Ok(true)` if restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if the restart itself fails.
    pub async fn restart_if_allowed(&self, name: &str) -> McpResult<bool> {
        let managed = self.lookup(name).await?;
        let max_restarts = {
            let client = managed.client.lock().await;
            client.config().max_restarts
        };
        let current = managed.restart_count.load(std::sync::atomic::Ordering::Relaxed);
        if current >= max_restarts {
            warn!(server = name, current, max_restarts, "restart budget exhausted");
            return Ok(false);
        }
        self.restart(name).await?;
        Ok(true)
    }

    /// Names of servers configured with `auto_start = true`.
    pub async fn list_auto_start_names(&self) -> Vec<String> {
        let servers = self.servers.read().await;
        let mut names = Vec::new();
        for (name, managed) in servers.iter() {
            if managed.client.lock().await.config().auto_start {
                names.push(name.clone());
            }
        }
        names
    }

    /// Connect every auto-start server; individual failures are logged,
    /// not propagated.
    pub async fn connect_auto_servers(&self) -> usize {
        let names = self.list_auto_start_names().await;
        let mut connected = 0usize;
        for name in &names {
            match self.start(name).await {
                Ok(()) => {
                    connected = connected.saturating_add(1);
                    info!(server = %name, "auto-connected mcp server");
                },
                Err(e) => warn!(server = %name, error = %e, "failed to auto-connect mcp server"),
            }
        }
        connected
    }

    /// Proxy a `tools/call` to the named server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unknown, not running, or the
    /// call itself fails.
    pub async fn call_tool(&self, server: &str, tool: &str, args: Value) -> McpResult<ToolCallResult> {
        let managed = self.lookup(server).await?;
        let client = managed.client.lock().await;
        if !client.is_connected() {
            return Err(McpError::ServerNotRunning {
                name: server.to_string(),
            });
        }
        client.call_tool(tool, args).await
    }

    /// Build the combined `server:name -> tool` map across every running
    /// server (used to populate `tools/list`, §4.1).
    pub async fn all_tool_ids(&self) -> Vec<String> {
        let servers = self.servers.read().await;
        let mut ids = Vec::new();
        for managed in servers.values() {
            let client = managed.client.lock().await;
            if client.is_connected() {
                ids.extend(client.tool_map().await.into_keys());
            }
        }
        ids
    }

    /// List currently-running server ids.
    pub async fn list_running(&self) -> Vec<String> {
        let servers = self.servers.read().await;
        let mut running = Vec::new();
        for (name, managed) in servers.iter() {
            if managed.client.lock().await.is_connected() {
                running.push(name.clone());
            }
        }
        running
    }

    /// Point-in-time status for every configured server.
    pub async fn server_statuses(&self) -> Vec<McpServerStatus> {
        let servers = self.servers.read().await;
        let mut statuses = Vec::with_capacity(servers.len());
        for (name, managed) in servers.iter() {
            let client = managed.client.lock().await;
            statuses.push(McpServerStatus {
                name: name.clone(),
                running: client.is_connected(),
                pid: None,
                tool_count: client.cached_tools().await.len(),
                restart_count: managed.restart_count.load(std::sync::atomic::Ordering::Relaxed),
            });
        }
        statuses
    }
}

impl std::fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerManager").finish_non_exhaustive()
    }
}
