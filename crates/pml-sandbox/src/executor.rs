//! The sandbox executor (§4.4): wraps code, spawns an isolated Node.js
//! child, drives the RPC bridge, and enforces the wall-clock timeout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::bridge::{RpcBridge, ToolRouter};
use crate::error::{SandboxError, SandboxResult};
use crate::outcome::SandboxOutcome;
use crate::permissions::{self, SandboxPermissions};
use crate::sanitize::sanitize;
use crate::wrap::wrap_code;
use pml_core::ids::ToolId;
use pml_core::workflow::ApprovalKind;

/// Tunables for one sandboxed execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// The `node` (or compatible) binary to invoke. Resolved with
    /// `which` against `$PATH` if not an absolute path.
    pub runtime_binary: String,
    /// Memory cap in megabytes.
    pub memory_cap_mb: u64,
    /// Wall-clock timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra read-only paths to allow beyond the wrapped temp file.
    pub allowed_read_paths: Vec<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime_binary: "node".to_string(),
            memory_cap_mb: permissions::DEFAULT_MEMORY_CAP_MB,
            timeout_ms: permissions::DEFAULT_TIMEOUT_MS,
            allowed_read_paths: Vec::new(),
        }
    }
}

/// Executes untrusted code in an isolated subprocess (§4.4).
pub struct SandboxExecutor {
    config: SandboxConfig,
    router: Arc<dyn ToolRouter>,
}

impl SandboxExecutor {
    /// Build an executor that routes in-sandbox tool calls through `router`.
    #[must_use]
    pub fn new(config: SandboxConfig, router: Arc<dyn ToolRouter>) -> Self {
        Self { config, router }
    }

    /// Wrap `code` with `context`, run it in an isolated child process,
    /// and return its typed outcome.
    ///
    /// The wrapped-code temp file is removed on every exit path —
    /// success, failure, or timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`SandboxError`] (already path-sanitized) if the code
    /// could not be wrapped, the child could not be spawned, or the
    /// child's output could not be parsed. A runtime exception thrown by
    /// the user's code is reported as `Ok(SandboxOutcome::Failed)`, not
    /// as an `Err` — only infrastructure failures are `Err`.
    pub async fn execute(
        &self,
        context: HashMap<String, Value>,
        code: &str,
    ) -> SandboxResult<SandboxOutcome> {
        let wrapped = wrap_code(&context, code)?;

        let temp_file = tempfile::Builder::new()
            .prefix("pml-exec-")
            .suffix(".js")
            .tempfile()
            .map_err(SandboxError::Io)?;
        let temp_path = temp_file.path().to_path_buf();
        tokio::fs::write(&temp_path, wrapped.as_bytes())
            .await
            .map_err(SandboxError::Io)?;

        let result = self.run_child(&temp_path).await;

        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            warn!(error = %e, "failed to remove sandbox temp file");
        }
        // `NamedTempFile`'s own `Drop` silently ignores a missing file,
        // so the explicit removal above is safe to race against it.
        drop(temp_file);

        result.map(|outcome| sanitize_outcome(outcome, &temp_path))
    }

    async fn run_child(&self, temp_path: &PathBuf) -> SandboxResult<SandboxOutcome> {
        let resolved_binary = which::which(&self.config.runtime_binary).ok();
        let binary = resolved_binary
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.runtime_binary.clone());

        let permissions = SandboxPermissions::new(temp_path.clone())
            .with_memory_cap_mb(self.config.memory_cap_mb)
            .with_timeout_ms(self.config.timeout_ms)
            .with_interpreter(resolved_binary.as_deref().unwrap_or(Path::new(&binary)));
        let permissions = self
            .config
            .allowed_read_paths
            .iter()
            .cloned()
            .fold(permissions, SandboxPermissions::with_read_path);

        let mut command = Command::new(&binary);
        command
            .arg(&permissions.memory_flag())
            .arg(temp_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        permissions::apply(&mut command, &permissions);

        let mut child = command.spawn().map_err(SandboxError::Io)?;
        let stdin = child.stdin.take().ok_or(SandboxError::RuntimeError(
            "sandbox child stdin was not piped".to_string(),
        ))?;
        let stdout = child.stdout.take().ok_or(SandboxError::RuntimeError(
            "sandbox child stdout was not piped".to_string(),
        ))?;
        let stderr = child.stderr.take();

        let stderr_task = stderr.map(|stderr| {
            tokio::spawn(async move {
                use tokio::io::{AsyncBufReadExt, BufReader};
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("sandbox stderr: {line}");
                }
            })
        });

        let bridge = RpcBridge::new(Arc::clone(&self.router));
        let timeout = std::time::Duration::from_millis(self.config.timeout_ms);

        let run = tokio::time::timeout(timeout, bridge.run(stdout, stdin));

        let outcome = match run.await {
            Ok(Ok(marker_body)) => parse_marker(&marker_body),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(SandboxError::TimeoutError {
                    timeout_ms: self.config.timeout_ms,
                })
            },
        };

        if let Some(task) = stderr_task {
            task.abort();
        }
        let _ = child.wait().await;

        outcome
    }
}

fn parse_marker(body: &str) -> SandboxResult<SandboxOutcome> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SandboxError::ParseError(e.to_string()))?;

    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| SandboxError::ParseError("result envelope missing 'success'".to_string()))?;

    if success {
        let result = value.get("result").cloned().unwrap_or(Value::Null);
        return Ok(SandboxOutcome::Completed { result });
    }

    let error = value.get("error").cloned().unwrap_or(Value::Null);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown sandbox error")
        .to_string();

    if let Some(pause) = try_parse_pause(&error) {
        return Ok(pause);
    }

    Ok(SandboxOutcome::Failed {
        error: SandboxError::RuntimeError(message),
    })
}

/// A paused-for-approval outcome is signalled by the shim as a thrown
/// error carrying a structured `pml_pause` payload, since the sandbox
/// child has no other channel to distinguish "needs approval" from
/// "genuinely failed". This is unwrapped back into a first-class
/// [`SandboxOutcome::Paused`] on the Rust side (§9 redesign).
fn try_parse_pause(error: &Value) -> Option<SandboxOutcome> {
    let pause = error.get("pml_pause")?;
    let approval_kind: ApprovalKind = serde_json::from_value(pause.get("approval_kind")?.clone()).ok()?;
    let tool_id_raw = pause.get("tool_id")?.as_str()?;
    let tool_id = ToolId::parse(tool_id_raw).ok()?;
    let payload = pause.get("payload").cloned().unwrap_or(Value::Null);
    Some(SandboxOutcome::Paused {
        approval_kind,
        tool_id,
        payload,
    })
}

fn sanitize_outcome(outcome: SandboxOutcome, temp_path: &std::path::Path) -> SandboxOutcome {
    match outcome {
        SandboxOutcome::Failed { error } => SandboxOutcome::Failed {
            error: sanitize_error(error, temp_path),
        },
        other => other,
    }
}

fn sanitize_error(error: SandboxError, temp_path: &std::path::Path) -> SandboxError {
    match error {
        SandboxError::RuntimeError(message) => {
            SandboxError::RuntimeError(sanitize(&message, temp_path))
        },
        SandboxError::SyntaxError(message) => {
            SandboxError::SyntaxError(sanitize(&message, temp_path))
        },
        SandboxError::ParseError(message) => {
            SandboxError::ParseError(sanitize(&message, temp_path))
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_marker_reports_completion() {
        let outcome = parse_marker(r#"{"success":true,"result":42}"#).unwrap();
        assert!(outcome.is_completed());
    }

    #[test]
    fn parse_marker_reports_failure() {
        let outcome = parse_marker(r#"{"success":false,"error":{"type":"Error","message":"boom"}}"#).unwrap();
        assert!(matches!(outcome, SandboxOutcome::Failed { .. }));
    }

    #[test]
    fn sandbox_config_defaults_match_spec() {
        let config = SandboxConfig::default();
        assert_eq!(config.memory_cap_mb, 512);
        assert_eq!(config.timeout_ms, 30_000);
    }
}
