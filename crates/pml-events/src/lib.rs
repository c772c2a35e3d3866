//! PML Events - the live event stream manager (§4.10).
//!
//! Fans out composite/tool UI events to connected SSE clients over a
//! broadcast channel: a connection cap enforced at `connect()` time, a
//! per-client `connected` event, and a periodic `heartbeat`. Delivery to
//! any single client preserves broadcast order; there is no replay.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod manager;
pub mod message;

pub use error::{EventsError, EventsResult};
pub use manager::{
    spawn_heartbeat, ClientHandle, EventStreamManager, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_CLIENTS,
};
pub use message::EventMessage;
