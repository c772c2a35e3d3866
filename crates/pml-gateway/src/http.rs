//! The HTTP surface (§4.10): live event feed (SSE + a small human-
//! facing viewer page), registered UI documents served for direct
//! browser viewing, and a `/health` endpoint. Used when
//! `gateway.http_bind` is configured; otherwise the gateway speaks
//! stdio only (§4.2).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use pml_events::{ClientHandle, EventMessage};

use crate::health::run_health_checks;
use crate::state::GatewayState;

/// Build the axum router for HTTP mode, with CORS and tracing layered
/// per `config.gateway.cors_origins` (§5).
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/", get(live_feed_page))
        .route("/feed", get(sse_feed))
        .route("/ui/*path", get(ui_resource))
        .route("/health", get(health_route))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();
    CorsLayer::new()
        .allow_methods([axum::http::Method::GET])
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            patterns.iter().any(|pattern| origin_matches(pattern, origin))
        }))
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => origin.starts_with(prefix),
        None => pattern == origin,
    }
}

async fn health_route(State(state): State<Arc<GatewayState>>) -> Json<serde_json::Value> {
    let statuses = state.servers.server_statuses().await;
    let mcp_configured = statuses.len();
    let mcp_running = statuses.iter().filter(|s| s.running).count();
    let sse_connected = state.events.as_ref().map_or(0, |e| e.connected_count());
    let sse_max_clients = state.config.events.max_clients;
    let pending_count = state.pending.len().await;

    let status = run_health_checks(
        mcp_running,
        mcp_configured,
        sse_connected,
        sse_max_clients,
        pending_count,
        state.uptime(),
        env!("CARGO_PKG_VERSION"),
    )
    .await;
    Json(serde_json::to_value(status).unwrap_or(serde_json::Value::Null))
}

async fn ui_resource(State(state): State<Arc<GatewayState>>, Path(path): Path<String>) -> Response {
    let uri = format!("ui://{path}");
    match state.ui_registry.get(&uri) {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::NOT_FOUND, "no ui resource registered at this uri").into_response(),
    }
}

enum FeedPhase {
    Initial(EventMessage, ClientHandle),
    Streaming(ClientHandle),
}

fn to_sse_event(message: &EventMessage) -> Event {
    Event::default().event(message.event.clone()).data(message.data.to_string())
}

async fn sse_feed(State(state): State<Arc<GatewayState>>) -> Response {
    let Some(events) = state.events.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let client = match events.connect() {
        Ok(client) => client,
        Err(pml_events::EventsError::AtCapacity { max_clients }) => {
            let body = serde_json::json!({"error": "at capacity", "max_clients": max_clients});
            return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        },
    };
    let connected_event = client.connected_event.clone();

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> = Box::pin(stream::unfold(
        FeedPhase::Initial(connected_event, client),
        |phase| async move {
            match phase {
                FeedPhase::Initial(event, client) => Some((Ok(to_sse_event(&event)), FeedPhase::Streaming(client))),
                FeedPhase::Streaming(mut client) => loop {
                    match client.recv().await {
                        Ok(message) => return Some((Ok(to_sse_event(&message)), FeedPhase::Streaming(client))),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "sse client lagged, dropping buffered events");
                            continue;
                        },
                        Err(RecvError::Closed) => return None,
                    }
                },
            }
        },
    ));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))).into_response()
}

async fn live_feed_page() -> Html<&'static str> {
    Html(LIVE_FEED_HTML)
}

const LIVE_FEED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>PML gateway - live feed</title>
<style>
body{margin:0;background:#111;color:#eee;font-family:ui-monospace,monospace;padding:1rem;}
#log{white-space:pre-wrap;font-size:0.85rem;}
.event{border-bottom:1px solid #333;padding:4px 0;}
.event .kind{color:#6cf;}
</style>
</head>
<body>
<h1>PML gateway</h1>
<div id="log"></div>
<script>
(function () {
  "use strict";
  var log = document.getElementById("log");
  var source = new EventSource("/feed");
  source.onmessage = function (event) {
    var line = document.createElement("div");
    line.className = "event";
    line.textContent = event.data;
    log.prepend(line);
  };
  ["connected", "heartbeat", "tool_result"].forEach(function (kind) {
    source.addEventListener(kind, function (event) {
      var line = document.createElement("div");
      line.className = "event";
      line.innerHTML = "<span class=\"kind\">[" + kind + "]</span> " + event.data;
      log.prepend(line);
    });
  });
})();
</script>
</body>
</html>
"#;
