//! Health and metrics endpoint (§ [AMBIENT] Metrics), shaped after the
//! teacher's `astrid-gateway::health` module: a per-component
//! [`HealthCheck`] with a builder for each state, aggregated into one
//! [`HealthStatus`] the HTTP surface's `GET /health` route serves.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall health state of one component or the gateway as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// All systems healthy.
    Healthy,
    /// Degraded but still serving requests.
    Degraded,
    /// Critical issues; requests may be failing.
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// The result of a single component health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Name of the component being checked.
    pub component: String,
    /// Health state.
    pub state: HealthState,
    /// Human-readable message, present for anything less than healthy.
    pub message: Option<String>,
    /// Check duration.
    pub duration_ms: u64,
    /// When this check was performed.
    pub checked_at: DateTime<Utc>,
    /// Additional structured details (e.g. connected-client counts).
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthCheck {
    /// A healthy check result.
    #[must_use]
    pub fn healthy(component: impl Into<String>, duration: Duration) -> Self {
        Self::with_state(component, HealthState::Healthy, None, duration)
    }

    /// An unhealthy check result.
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self::with_state(component, HealthState::Unhealthy, Some(message.into()), duration)
    }

    /// A degraded check result.
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self::with_state(component, HealthState::Degraded, Some(message.into()), duration)
    }

    fn with_state(component: impl Into<String>, state: HealthState, message: Option<String>, duration: Duration) -> Self {
        Self {
            component: component.into(),
            state,
            message,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            checked_at: Utc::now(),
            details: HashMap::new(),
        }
    }

    /// Attach a structured detail, best-effort (a value that fails to
    /// serialize is silently dropped rather than failing the check).
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }
}

/// The gateway's aggregate health, as served by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Aggregate state across all checks.
    pub state: HealthState,
    /// When this status was computed.
    pub checked_at: DateTime<Utc>,
    /// Individual check results.
    pub checks: Vec<HealthCheck>,
    /// Gateway uptime in seconds.
    pub uptime_secs: u64,
    /// Crate version string.
    pub version: String,
}

impl HealthStatus {
    /// Aggregate `checks` into one status. Unhealthy dominates degraded,
    /// which dominates healthy; an empty check list is healthy (nothing
    /// reported a problem).
    #[must_use]
    pub fn from_checks(checks: Vec<HealthCheck>, uptime: Duration, version: impl Into<String>) -> Self {
        let state = Self::aggregate_state(&checks);
        Self {
            state,
            checked_at: Utc::now(),
            checks,
            uptime_secs: uptime.as_secs(),
            version: version.into(),
        }
    }

    fn aggregate_state(checks: &[HealthCheck]) -> HealthState {
        if checks.iter().any(|c| c.state == HealthState::Unhealthy) {
            HealthState::Unhealthy
        } else if checks.iter().any(|c| c.state == HealthState::Degraded) {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }

    /// Whether the aggregate state is [`HealthState::Healthy`].
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Run the gateway's health checks: MCP server connectivity, SSE client
/// headroom, and the pending-workflow store's liveness.
pub async fn run_health_checks(
    mcp_running: usize,
    mcp_configured: usize,
    sse_connected: usize,
    sse_max_clients: usize,
    pending_count: usize,
    uptime: Duration,
    version: &str,
) -> HealthStatus {
    let mut checks = Vec::new();

    let start = std::time::Instant::now();
    let mcp_check = if mcp_configured == 0 {
        HealthCheck::healthy("mcp", start.elapsed())
    } else if mcp_running == 0 {
        HealthCheck::unhealthy("mcp", "no configured mcp servers are connected", start.elapsed())
    } else if mcp_running < mcp_configured {
        HealthCheck::degraded(
            "mcp",
            format!("{mcp_running}/{mcp_configured} configured servers connected"),
            start.elapsed(),
        )
    } else {
        HealthCheck::healthy("mcp", start.elapsed())
    }
    .with_detail("running", mcp_running)
    .with_detail("configured", mcp_configured);
    checks.push(mcp_check);

    let start = std::time::Instant::now();
    let sse_check = if sse_connected >= sse_max_clients {
        HealthCheck::degraded("events", "sse client cap reached", start.elapsed())
    } else {
        HealthCheck::healthy("events", start.elapsed())
    }
    .with_detail("connected", sse_connected)
    .with_detail("max_clients", sse_max_clients);
    checks.push(sse_check);

    let start = std::time::Instant::now();
    let pending_check = HealthCheck::healthy("pending_workflows", start.elapsed()).with_detail("count", pending_count);
    checks.push(pending_check);

    HealthStatus::from_checks(checks, uptime, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_configured_servers_is_healthy() {
        let status = run_health_checks(0, 0, 0, 100, 0, Duration::from_secs(1), "0.1.0").await;
        assert!(status.is_healthy());
    }

    #[tokio::test]
    async fn zero_of_configured_servers_running_is_unhealthy() {
        let status = run_health_checks(0, 2, 0, 100, 0, Duration::from_secs(1), "0.1.0").await;
        assert_eq!(status.state, HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn partial_mcp_connectivity_is_degraded_overall() {
        let status = run_health_checks(1, 2, 0, 100, 0, Duration::from_secs(1), "0.1.0").await;
        assert_eq!(status.state, HealthState::Degraded);
    }

    #[tokio::test]
    async fn sse_at_capacity_is_degraded() {
        let status = run_health_checks(0, 0, 100, 100, 0, Duration::from_secs(1), "0.1.0").await;
        assert_eq!(status.state, HealthState::Degraded);
    }
}
