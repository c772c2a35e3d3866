//! Sandbox error taxonomy (§4.4, §7).

use thiserror::Error;

/// Errors produced by a sandboxed execution.
///
/// Every variant's display text has already been path-sanitized
/// (`sanitize::sanitize`) by the time it reaches the caller — temp-file
/// paths are replaced with `<temp-file>`, home directories with `<home>`.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The wall-clock timeout elapsed before the child exited.
    #[error("execution timed out after {timeout_ms}ms")]
    TimeoutError {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The child exceeded its memory cap.
    #[error("execution exceeded memory limit of {limit_mb}MB")]
    MemoryError {
        /// The configured cap.
        limit_mb: u64,
    },

    /// The sandbox denied an operation the code attempted (§4.7 input).
    #[error("permission denied: {0}")]
    PermissionError(String),

    /// The child's runtime reported a syntax error parsing the wrapped code.
    #[error("syntax error: {0}")]
    SyntaxError(String),

    /// The user code threw at runtime.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// The child's stdout could not be parsed as the expected envelope.
    #[error("failed to parse sandbox output: {0}")]
    ParseError(String),

    /// A context-binding name failed `[A-Za-z_][A-Za-z0-9_]*` (§4.4 layer 1).
    #[error("invalid context binding name: {0}")]
    InvalidContext(String),

    /// Spawning or driving the child process failed.
    #[error("sandbox process error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for [`SandboxError`].
pub type SandboxResult<T> = Result<T, SandboxError>;
