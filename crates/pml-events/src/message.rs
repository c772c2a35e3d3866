//! The SSE wire message shape (§4.10): `event: <type>\ndata: <json>\n\n`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One server-sent event: a type tag and a JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    /// The SSE `event:` field.
    pub event: String,
    /// The JSON-encoded `data:` payload.
    pub data: Value,
}

impl EventMessage {
    /// Construct a message from a type tag and any serializable payload.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            event: event.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// Render as the literal SSE wire frame: `event: <type>\ndata: <json>\n\n`.
    #[must_use]
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }

    /// The `connected` event sent once to a newly-connected client (§4.10).
    #[must_use]
    pub fn connected(client_id: Uuid, connected_count: usize, timestamp: DateTime<Utc>) -> Self {
        Self::new(
            "connected",
            serde_json::json!({
                "clientId": client_id,
                "connectedClients": connected_count,
                "timestamp": timestamp,
            }),
        )
    }

    /// The periodic `heartbeat` event (§4.10).
    #[must_use]
    pub fn heartbeat(connected_count: usize, uptime_seconds: u64) -> Self {
        Self::new(
            "heartbeat",
            serde_json::json!({
                "connectedClients": connected_count,
                "uptimeSeconds": uptime_seconds,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frame_matches_wire_shape() {
        let message = EventMessage::new("tool_result", serde_json::json!({"a": 1}));
        let frame = message.to_sse_frame();
        assert_eq!(frame, "event: tool_result\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn connected_event_carries_client_id_and_count() {
        let id = Uuid::new_v4();
        let message = EventMessage::connected(id, 3, Utc::now());
        assert_eq!(message.event, "connected");
        assert_eq!(message.data["connectedClients"], 3);
    }
}
