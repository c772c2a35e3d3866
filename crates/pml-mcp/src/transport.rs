//! Newline-delimited JSON-RPC framing over a child process's stdio (§4.2).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::error::{McpError, McpResult};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A single child-process MCP transport.
///
/// Framing is newline-delimited JSON: one JSON-RPC object per line. The
/// child's stderr is drained on a separate task and forwarded to the
/// logger, prefixed with the server id, so a misbehaving server can never
/// block stdout by filling its stderr pipe.
pub struct StdioTransport {
    name: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader_task: tokio::task::JoinHandle<()>,
    stderr_task: tokio::task::JoinHandle<()>,
}

impl StdioTransport {
    /// Spawn `command args...` and wire up stdout/stderr framing.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ConnectError`] if the process cannot be spawned.
    pub async fn spawn(
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> McpResult<Self> {
        let resolved = which::which(command)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| command.to_string());

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::ConnectError {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::ConnectError {
            name: name.to_string(),
            reason: "child stdin was not piped".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::ConnectError {
            name: name.to_string(),
            reason: "child stdout was not piped".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| McpError::ConnectError {
            name: name.to_string(),
            reason: "child stderr was not piped".to_string(),
        })?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = {
            let pending = Arc::clone(&pending);
            let server_name = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            Self::dispatch_line(&server_name, &line, &pending).await;
                        },
                        Ok(None) => {
                            debug!(server = %server_name, "mcp stdout closed");
                            break;
                        },
                        Err(e) => {
                            warn!(server = %server_name, error = %e, "error reading mcp stdout");
                            break;
                        },
                    }
                }
                // Reject every still-pending request: the child will never
                // answer them now that stdout is closed.
                let mut pending = pending.lock().await;
                for (_, tx) in pending.drain() {
                    let _ = tx.send(Value::Null);
                }
            })
        };

        let stderr_task = {
            let server_name = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(server = %server_name, "{line}");
                }
            })
        };

        Ok(Self {
            name: name.to_string(),
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
            stderr_task,
        })
    }

    async fn dispatch_line(server_name: &str, line: &str, pending: &PendingMap) {
        let parsed: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(server = %server_name, error = %e, "malformed mcp response line");
                return;
            },
        };
        let Some(id) = parsed.get("id").and_then(Value::as_u64) else {
            debug!(server = %server_name, "mcp notification (no id), dropping");
            return;
        };
        let mut pending = pending.lock().await;
        if let Some(tx) = pending.remove(&id) {
            let _ = tx.send(parsed);
        } else {
            debug!(server = %server_name, id, "mcp response for unknown/expired request id");
        }
    }

    /// Send a JSON-RPC request and await the correlated response.
    ///
    /// A request timeout does not implicitly close the subprocess (§4.2);
    /// the pending entry is simply removed so a late reply is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] on a write failure, or
    /// [`McpError::TimeoutError`] if no response arrives in time.
    pub async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_string(&request).map_err(|e| McpError::MalformedResponse {
            server: self.name.clone(),
            reason: e.to_string(),
        })?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        {
            let mut stdin = self.stdin.lock().await;
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(|e| McpError::Transport {
                    server: self.name.clone(),
                    source: e,
                })?;
            stdin.flush().await.map_err(|e| McpError::Transport {
                server: self.name.clone(),
                source: e,
            })?;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(McpError::Transport {
                server: self.name.clone(),
                source: std::io::Error::other("response channel closed before reply arrived"),
            }),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                Err(McpError::TimeoutError {
                    server: self.name.clone(),
                    method: method.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            },
        }
    }

    /// Send a one-way notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] on a write failure.
    pub async fn notify(&self, method: &str, params: Value) -> McpResult<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let mut line =
            serde_json::to_string(&notification).map_err(|e| McpError::MalformedResponse {
                server: self.name.clone(),
                reason: e.to_string(),
            })?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Transport {
                server: self.name.clone(),
                source: e,
            })
    }

    /// The process id, if still running.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.id()
    }

    /// Release stream locks and kill the child process. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::Transport`] if the process cannot be killed.
    pub async fn close(&self) -> McpResult<()> {
        self.reader_task.abort();
        self.stderr_task.abort();
        let mut child = self.child.lock().await;
        match child.start_kill() {
            Ok(()) | Err(_) => {
                // start_kill() on an already-exited child returns an error;
                // closing is idempotent either way.
                let _ = child.wait().await;
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_times_out_when_server_never_replies() {
        let env = HashMap::new();
        let transport = StdioTransport::spawn("cat-server", "cat", &[], &env)
            .await
            .expect("cat should always be spawnable in test environments");
        let result = transport
            .request("tools/list", serde_json::json!({}), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(McpError::TimeoutError { .. })));
        transport.close().await.unwrap();
    }
}
