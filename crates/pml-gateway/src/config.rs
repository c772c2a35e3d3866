//! Layered gateway configuration: built-in defaults, overridden by a TOML
//! file, overridden again by environment variables (§6 "Environment",
//! [AMBIENT] Configuration). Shaped after the teacher's
//! `astrid-gateway::config::GatewayConfig` — nested `#[serde(default)]`
//! sections, a `load`/`load_default` pair, and small `effective_*`
//! accessors that convert a config section into the runtime type its
//! owning crate actually wants.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pml_mcp::config::ServersConfig;

use crate::error::GatewayResult;

/// Default `maxConcurrent` in-flight `tools/call` requests (§4.1, §5).
pub const DEFAULT_MAX_CONCURRENT: usize = 8;
/// Default bounded-FIFO queue depth before `-32000` backpressure (§4.1).
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Transport and workspace settings.
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Concurrency control (§4.1, §5).
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Sandbox executor tunables (§4.4), converted to
    /// [`pml_sandbox::SandboxConfig`] by [`SandboxSettings::to_sandbox_config`].
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Configured MCP tool servers (§4.2), reused directly from `pml-mcp`.
    #[serde(default)]
    pub mcp: ServersConfig,
    /// Live event stream tunables (§4.10).
    #[serde(default)]
    pub events: EventsConfig,
    /// Cloud planner connection settings (§4.3, §6).
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Structured logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport mode selection and workspace location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Address to bind the HTTP+SSE surface to, if running in HTTP mode
    /// (e.g. `"0.0.0.0:8787"`). `None` means stdio mode.
    #[serde(default)]
    pub http_bind: Option<String>,
    /// Workspace directory containing the env file reloaded on
    /// `api_key_required`/`oauth_connect` resume (§6 "Environment").
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// CORS origin patterns for the HTTP surface (§4.10 "CORS"). Default
    /// matches the spec's `http://localhost:*` allowance.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            http_bind: None,
            workspace_root: default_workspace_root(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".to_string()]
}

/// `maxConcurrent`/bounded-queue settings (§4.1, §5 Backpressure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum in-flight `tools/call` requests.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum number of requests allowed to wait once `max_concurrent`
    /// is saturated, before `-32000` is returned.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Sandbox executor tunables (§4.4), the serde-friendly mirror of
/// [`pml_sandbox::SandboxConfig`] (which itself carries no serde
/// derives, since nothing upstream of the gateway's config loader needs
/// to serialize it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// The `node` (or compatible) binary to invoke.
    #[serde(default = "default_runtime_binary")]
    pub runtime_binary: String,
    /// Memory cap in megabytes.
    #[serde(default = "default_memory_cap_mb")]
    pub memory_cap_mb: u64,
    /// Wall-clock timeout in milliseconds.
    #[serde(default = "default_sandbox_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra read-only paths to allow beyond the wrapped temp file.
    #[serde(default)]
    pub allowed_read_paths: Vec<PathBuf>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let defaults = pml_sandbox::SandboxConfig::default();
        Self {
            runtime_binary: defaults.runtime_binary,
            memory_cap_mb: defaults.memory_cap_mb,
            timeout_ms: defaults.timeout_ms,
            allowed_read_paths: defaults.allowed_read_paths,
        }
    }
}

fn default_runtime_binary() -> String {
    pml_sandbox::SandboxConfig::default().runtime_binary
}

fn default_memory_cap_mb() -> u64 {
    pml_sandbox::SandboxConfig::default().memory_cap_mb
}

fn default_sandbox_timeout_ms() -> u64 {
    pml_sandbox::SandboxConfig::default().timeout_ms
}

impl SandboxSettings {
    /// Build the runtime [`pml_sandbox::SandboxConfig`] this section describes.
    #[must_use]
    pub fn to_sandbox_config(&self) -> pml_sandbox::SandboxConfig {
        pml_sandbox::SandboxConfig {
            runtime_binary: self.runtime_binary.clone(),
            memory_cap_mb: self.memory_cap_mb,
            timeout_ms: self.timeout_ms,
            allowed_read_paths: self.allowed_read_paths.clone(),
        }
    }
}

/// Live event stream tunables (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Maximum concurrently-connected SSE clients.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Heartbeat cadence in milliseconds.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            heartbeat_interval_ms: default_heartbeat_ms(),
        }
    }
}

fn default_max_clients() -> usize {
    pml_events::DEFAULT_MAX_CLIENTS
}

fn default_heartbeat_ms() -> u64 {
    u64::try_from(pml_events::DEFAULT_HEARTBEAT_INTERVAL.as_millis()).unwrap_or(30_000)
}

/// Cloud planner connection settings (§4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the cloud planner's forward endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable carrying the bearer token (§6
    /// "Environment": `PML_API_KEY`).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-forward HTTP timeout in milliseconds.
    #[serde(default = "default_cloud_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_cloud_timeout_ms(),
        }
    }
}

fn default_api_key_env() -> String {
    "PML_API_KEY".to_string()
}

fn default_cloud_timeout_ms() -> u64 {
    30_000
}

/// Structured-logging configuration (§ [AMBIENT] Logging & tracing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `"compact"` or `"json"`, overridable by `PML_LOG_FORMAT`.
    #[serde(default = "default_log_format")]
    pub format: String,
    /// `tracing-subscriber` `EnvFilter` directive, e.g. `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Built-in defaults overridden only by environment variables (no
    /// config file present).
    #[must_use]
    pub fn load_defaults() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load from `path` if it exists, otherwise fall back to defaults;
    /// either way, environment variables are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` exists but fails to read or parse.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::load_defaults())
        }
    }

    /// Apply the environment-variable override layer (§6 "Environment",
    /// [AMBIENT] Configuration: "defaults → TOML file → environment
    /// overrides"). Only a small, explicitly-named set of fields are
    /// overridable this way — the rest come from the file or defaults.
    fn apply_env_overrides(&mut self) {
        if let Ok(format) = std::env::var("PML_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(bind) = std::env::var("PML_HTTP_BIND") {
            self.gateway.http_bind = Some(bind);
        }
        if let Ok(max_concurrent) = std::env::var("PML_MAX_CONCURRENT") {
            if let Ok(parsed) = max_concurrent.parse() {
                self.concurrency.max_concurrent = parsed;
            }
        }
    }

    /// Resolve the cloud API key from the environment variable named by
    /// `cloud.api_key_env`, if set.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.cloud.api_key_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = GatewayConfig::default();
        let serialized = toml::to_string(&config).expect("serializable");
        let parsed: GatewayConfig = toml::from_str(&serialized).expect("parseable");
        assert_eq!(parsed.concurrency.max_concurrent, DEFAULT_MAX_CONCURRENT);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GatewayConfig = toml::from_str("").expect("empty config parses to defaults");
        assert_eq!(config.concurrency.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.gateway.http_bind.is_none());
    }

    #[test]
    fn load_or_default_falls_back_when_file_absent() {
        let config = GatewayConfig::load_or_default("/nonexistent/pml-gateway.toml").expect("falls back");
        assert_eq!(config.concurrency.max_concurrent, DEFAULT_MAX_CONCURRENT);
    }

    #[test]
    fn sandbox_settings_convert_to_sandbox_config() {
        let settings = SandboxSettings::default();
        let runtime = settings.to_sandbox_config();
        assert_eq!(runtime.runtime_binary, settings.runtime_binary);
        assert_eq!(runtime.memory_cap_mb, settings.memory_cap_mb);
    }
}
