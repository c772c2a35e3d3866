//! The stdio JSON-RPC transport (§4.2's framing style applied in the
//! opposite direction): newline-delimited JSON objects read from
//! stdin, newline-delimited JSON responses written to stdout. Used
//! when `gateway.http_bind` is unset — the gateway runs as a local MCP
//! server a host spawns as a subprocess.

use std::sync::Arc;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::dispatch;
use crate::rpc::parse_request;
use crate::state::GatewayState;

/// Run the stdio request loop until stdin closes.
pub async fn run_stdio(state: Arc<GatewayState>) -> io::Result<()> {
    let session_id = Uuid::new_v4().to_string();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match parse_request(line.as_bytes()) {
            Ok(request) => {
                debug!(method = %request.method, "dispatching stdio request");
                dispatch(&state, request, &session_id).await
            },
            Err(response) => Some(response),
        };
        let Some(response) = response else {
            continue;
        };
        let mut rendered = serde_json::to_string(&response).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize response");
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\"internal error\"}}".to_string()
        });
        rendered.push('\n');
        stdout.write_all(rendered.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
