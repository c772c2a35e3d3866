//! Gateway-level error taxonomy (§4.1, §7).

use thiserror::Error;

/// Errors raised by the gateway's config loader, startup sequence, and
/// request demultiplexer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The config file's contents did not parse as valid TOML for
    /// [`crate::config::GatewayConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The request body was not valid JSON (§7 `ProtocolError`).
    #[error("malformed json-rpc request: {0}")]
    MalformedRequest(String),

    /// The orchestrator failed for reasons other than the user's code
    /// or the cloud forward failing in an expected way.
    #[error(transparent)]
    Orchestrator(#[from] pml_orchestrator::OrchestratorError),
}

/// Result alias for [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;
