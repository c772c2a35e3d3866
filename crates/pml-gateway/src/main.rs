//! The PML gateway binary (§1, §5 "Process model"): parses CLI flags,
//! loads configuration, and hands off to the `pml_gateway` library for
//! everything else.

#![deny(unsafe_code)]
#![deny(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use pml_gateway::config::GatewayConfig;

#[derive(Parser, Debug)]
#[command(name = "pml-gateway", version, about = "MCP protocol gateway for the PML hybrid execution runtime")]
struct Cli {
    /// Path to the gateway's TOML configuration file.
    #[arg(long, default_value = "pml-gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load_or_default(&cli.config)?;
    pml_gateway::init_tracing(&config.logging);

    let http_bind = config.gateway.http_bind.clone();
    let state = Arc::new(pml_gateway::build_state(config).await?);

    let shutdown = pml_gateway::shutdown_signal();
    tokio::select! {
        result = pml_gateway::serve(state.clone(), http_bind) => result?,
        () = shutdown => {
            info!("shutdown signal received, draining mcp servers");
            if let Err(e) = state.servers.stop_all().await {
                warn!(error = %e, "error stopping mcp servers during shutdown");
            }
        }
    }
    Ok(())
}
