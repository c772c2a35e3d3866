//! The gateway's shared runtime state: every collaborator the
//! demultiplexer (§4.1) needs, bundled behind one `Arc` so both the
//! stdio loop and the HTTP router can hand it to request handlers
//! without threading a dozen separate arguments through.

use std::sync::Arc;
use std::time::Instant;

use pml_capabilities::CapabilityRegistry;
use pml_events::EventStreamManager;
use pml_mcp::registry::ServerManager;
use pml_orchestrator::{Orchestrator, UiRegistry};
use pml_workflow::store::PendingWorkflowStore;

use crate::concurrency::ConcurrencyLimiter;
use crate::config::GatewayConfig;

/// Everything a request handler needs to serve one JSON-RPC call.
pub struct GatewayState {
    /// The hybrid execution orchestrator (§4.3).
    pub orchestrator: Arc<Orchestrator>,
    /// The configured MCP tool server registry (§4.2), used for admin
    /// introspection and health checks.
    pub servers: Arc<ServerManager>,
    /// The capability registry (§4.6), used by `discover`.
    pub capabilities: Arc<CapabilityRegistry>,
    /// The pending-workflow store (§4.5), used by `abort`/`admin`.
    pub pending: Arc<PendingWorkflowStore>,
    /// Registered composite/per-tool UI documents (§4.9).
    pub ui_registry: Arc<UiRegistry>,
    /// The live event stream, present only in HTTP mode (§4.10).
    pub events: Option<Arc<EventStreamManager>>,
    /// Bounded admission control for `tools/call` (§4.1, §5).
    pub concurrency: Arc<ConcurrencyLimiter>,
    /// The loaded configuration.
    pub config: GatewayConfig,
    /// When the gateway process started, for uptime reporting.
    pub started_at: Instant,
}

impl GatewayState {
    /// Seconds since the gateway started.
    #[must_use]
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
