//! The live event stream manager (§4.10): SSE fan-out over a broadcast
//! channel, with a connection cap and a periodic heartbeat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{EventsError, EventsResult};
use crate::message::EventMessage;

/// Default SSE heartbeat cadence (§4.10).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Default maximum concurrently-connected SSE clients (§4.10).
pub const DEFAULT_MAX_CLIENTS: usize = 100;
const BROADCAST_CAPACITY: usize = 1024;

/// One connected client's subscription. Dropping it (client abort,
/// disconnect, or write error per §4.10) automatically frees its slot.
pub struct ClientHandle {
    /// A fresh client id, included in the initial `connected` event.
    pub client_id: Uuid,
    /// The `connected` event this client should see first.
    pub connected_event: EventMessage,
    receiver: broadcast::Receiver<Arc<EventMessage>>,
    count: Arc<AtomicUsize>,
}

impl ClientHandle {
    /// Await the next broadcast event. `Ok(None)`-equivalent lagging is
    /// surfaced as `Err` from the underlying channel; callers typically
    /// skip lagged events and keep reading rather than disconnecting,
    /// since SSE delivery has no replay guarantee (§4.10 "Ordering").
    pub async fn recv(&mut self) -> Result<Arc<EventMessage>, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the broadcast channel, the connected-client count, and the
/// process start time used for heartbeat uptime.
pub struct EventStreamManager {
    sender: broadcast::Sender<Arc<EventMessage>>,
    client_count: Arc<AtomicUsize>,
    max_clients: usize,
    started_at: Instant,
}

impl EventStreamManager {
    /// Build a manager with the default heartbeat interval and client cap.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_max_clients(DEFAULT_MAX_CLIENTS)
    }

    /// Build a manager with an explicit client cap.
    #[must_use]
    pub fn with_max_clients(max_clients: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Arc::new(Self {
            sender,
            client_count: Arc::new(AtomicUsize::new(0)),
            max_clients,
            started_at: Instant::now(),
        })
    }

    /// Register a new client connection (§4.10 connection lifecycle).
    ///
    /// # Errors
    ///
    /// Returns [`EventsError::AtCapacity`] if `maxClients` are already
    /// connected — the HTTP layer should translate this into a 503.
    pub fn connect(&self) -> EventsResult<ClientHandle> {
        loop {
            let current = self.client_count.load(Ordering::SeqCst);
            if current >= self.max_clients {
                return Err(EventsError::AtCapacity { max_clients: self.max_clients });
            }
            if self
                .client_count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let connected_count = current + 1;
                let client_id = Uuid::new_v4();
                debug!(%client_id, connected_count, "sse client connected");
                return Ok(ClientHandle {
                    client_id,
                    connected_event: EventMessage::connected(client_id, connected_count, Utc::now()),
                    receiver: self.sender.subscribe(),
                    count: Arc::clone(&self.client_count),
                });
            }
        }
    }

    /// Broadcast `message` to every connected client (§4.10). Returns
    /// the number of receivers the channel believes are live; a client
    /// that disconnected without dropping its handle yet may still be
    /// counted, resolved on its next failed send.
    pub fn broadcast(&self, message: EventMessage) -> usize {
        self.sender.send(Arc::new(message)).unwrap_or(0)
    }

    /// Current connected-client count.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Seconds since the manager was constructed.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Emit one heartbeat event now (§4.10).
    pub fn heartbeat_once(&self) -> usize {
        self.broadcast(EventMessage::heartbeat(self.connected_count(), self.uptime_seconds()))
    }
}

/// Spawn the periodic heartbeat task (§4.10). Runs until the returned
/// handle is aborted or dropped.
pub fn spawn_heartbeat(manager: Arc<EventStreamManager>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let receivers = manager.heartbeat_once();
            info!(receivers, connected = manager.connected_count(), "sse heartbeat");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_increments_and_drop_decrements_count() {
        let manager = EventStreamManager::with_max_clients(2);
        let client = manager.connect().unwrap();
        assert_eq!(manager.connected_count(), 1);
        drop(client);
        assert_eq!(manager.connected_count(), 0);
    }

    #[tokio::test]
    async fn connect_fails_past_max_clients() {
        let manager = EventStreamManager::with_max_clients(1);
        let _first = manager.connect().unwrap();
        let result = manager.connect();
        assert!(matches!(result, Err(EventsError::AtCapacity { max_clients: 1 })));
    }

    #[tokio::test]
    async fn broadcast_is_received_by_connected_clients() {
        let manager = EventStreamManager::with_max_clients(5);
        let mut client = manager.connect().unwrap();
        manager.broadcast(EventMessage::new("tool_result", serde_json::json!({"x": 1})));
        let received = client.recv().await.unwrap();
        assert_eq!(received.event, "tool_result");
    }

    #[tokio::test]
    async fn connected_event_is_per_client_not_broadcast() {
        let manager = EventStreamManager::with_max_clients(5);
        let first = manager.connect().unwrap();
        assert_eq!(first.connected_event.data["connectedClients"], 1);
        let second = manager.connect().unwrap();
        assert_eq!(second.connected_event.data["connectedClients"], 2);
    }
}
