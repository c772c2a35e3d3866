//! The PML gateway library (§1, §4.1): wires every collaborating crate
//! into one [`state::GatewayState`] and serves it over stdio or
//! HTTP+SSE. `src/main.rs` is a thin binary wrapper around
//! [`build_state`] and [`serve`]; integration tests exercise the same
//! [`dispatch::dispatch`] entry point the binary does, without going
//! through a process boundary.

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod concurrency;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod execute_wire;
pub mod health;
pub mod http;
pub mod meta_tools;
pub mod resources;
pub mod rpc;
pub mod state;
pub mod stdio;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pml_capabilities::{CapabilityRegistry, NullCapabilitySearch, SurrealCapabilityStore};
use pml_events::{spawn_heartbeat, EventStreamManager};
use pml_mcp::registry::ServerManager;
use pml_orchestrator::{HttpCloudPlanner, Orchestrator, SessionRegistry, UiRegistry};
use pml_threshold::ThresholdController;
use pml_workflow::store::{spawn_sweep, PendingWorkflowStore};

use crate::concurrency::ConcurrencyLimiter;
use crate::config::GatewayConfig;
use crate::state::GatewayState;

/// Fallback cloud planner endpoint used when `cloud.base_url` is unset,
/// so a gateway started with no config still boots (§4.3's
/// FORWARD_CLOUD transition simply fails until a real planner answers
/// there).
pub const LOCAL_DEV_CLOUD_URL: &str = "http://localhost:8080";

/// Default explicit-execution threshold (§4.8): intentionally never
/// auto-adjusted, unlike `suggestionThreshold`.
pub const DEFAULT_EXPLICIT_THRESHOLD: f64 = 0.85;
/// Default starting point for the adaptively-tuned suggestion threshold (§4.8).
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.60;

/// Sweep cadence for expiring pending workflows past their TTL (§4.5).
pub const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Install the `tracing` subscriber per [`config::LoggingConfig`]
/// (`PML_LOG_FORMAT`-style `text`/`json` selection).
pub fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Serve `state` over HTTP+SSE if `http_bind` is set, else over stdio.
///
/// # Errors
///
/// Returns an error if the HTTP listener cannot bind or the stdio loop
/// fails to read/write its framed transport.
pub async fn serve(state: Arc<GatewayState>, http_bind: Option<String>) -> anyhow::Result<()> {
    match http_bind {
        Some(bind) => {
            info!(%bind, "starting http+sse gateway");
            let router = http::build_router(Arc::clone(&state));
            let listener = tokio::net::TcpListener::bind(bind).await?;
            axum::serve(listener, router).await?;
            Ok(())
        },
        None => {
            info!("starting stdio gateway");
            stdio::run_stdio(state).await.map_err(Into::into)
        },
    }
}

/// Wait for Ctrl-C or (on unix) SIGTERM (§5 shutdown sequence).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Wire every collaborating crate into one [`GatewayState`] (§4.1
/// "Startup/lifecycle"): connects auto-start MCP servers, opens the
/// persistent capability store (falling back to in-memory), starts the
/// pending-workflow sweep, and builds the orchestrator.
///
/// # Errors
///
/// Returns an error if the in-memory capability store fallback itself
/// fails to open, which only happens if `surrealdb`'s embedded engine
/// cannot initialize at all.
pub async fn build_state(config: GatewayConfig) -> anyhow::Result<GatewayState> {
    let servers = Arc::new(ServerManager::new(config.mcp.clone()));
    let connected = servers.connect_auto_servers().await;
    info!(count = connected, "auto-connected mcp servers");

    let capabilities_db = config.gateway.workspace_root.join(".pml").join("capabilities.db");
    let capability_store = match std::fs::create_dir_all(config.gateway.workspace_root.join(".pml")) {
        Ok(()) => match SurrealCapabilityStore::open(&capabilities_db).await {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "failed to open persistent capability store, falling back to in-memory");
                None
            },
        },
        Err(e) => {
            warn!(error = %e, "failed to create workspace .pml directory, falling back to in-memory capability store");
            None
        },
    };
    let capability_store = match capability_store {
        Some(store) => store,
        None => SurrealCapabilityStore::in_memory().await?,
    };
    let capability_store = Arc::new(capability_store);
    let capabilities = Arc::new(CapabilityRegistry::new(
        capability_store.clone(),
        capability_store,
        Arc::new(NullCapabilitySearch),
    ));

    let pending = PendingWorkflowStore::new();
    spawn_sweep(Arc::clone(&pending), PENDING_SWEEP_INTERVAL);

    let sessions = Arc::new(SessionRegistry::new());
    let ui_registry = Arc::new(UiRegistry::new());

    let events = config.gateway.http_bind.as_ref().map(|_| {
        let manager = EventStreamManager::with_max_clients(config.events.max_clients);
        spawn_heartbeat(Arc::clone(&manager), Duration::from_millis(config.events.heartbeat_interval_ms));
        manager
    });

    let base_url = config.cloud.base_url.clone().unwrap_or_else(|| {
        warn!(default_url = LOCAL_DEV_CLOUD_URL, "cloud.base_url not configured, using default");
        LOCAL_DEV_CLOUD_URL.to_string()
    });
    let api_key = config.resolve_api_key().unwrap_or_default();
    let planner: Arc<dyn pml_orchestrator::CloudPlanner> = Arc::new(
        HttpCloudPlanner::new(base_url, api_key).with_timeout(Duration::from_millis(config.cloud.timeout_ms)),
    );

    let threshold = ThresholdController::new(DEFAULT_EXPLICIT_THRESHOLD, DEFAULT_SUGGESTION_THRESHOLD);
    let concurrency = Arc::new(ConcurrencyLimiter::new(config.concurrency.max_concurrent, config.concurrency.queue_capacity));
    let sandbox_config = config.sandbox.to_sandbox_config();
    let workspace_root = config.gateway.workspace_root.clone();

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&servers),
        planner,
        sandbox_config,
        Arc::clone(&pending),
        sessions,
        Arc::clone(&capabilities),
        threshold,
        Arc::clone(&ui_registry),
        events.clone(),
        workspace_root,
    ));

    Ok(GatewayState {
        orchestrator,
        servers,
        capabilities,
        pending,
        ui_registry,
        events,
        concurrency,
        config,
        started_at: Instant::now(),
    })
}
