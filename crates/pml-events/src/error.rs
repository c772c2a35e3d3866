//! Live event stream error taxonomy (§4.10).

use thiserror::Error;

/// Errors from the live event stream manager.
#[derive(Debug, Error)]
pub enum EventsError {
    /// `maxClients` connected writers are already registered (§4.10:
    /// surfaced by the HTTP layer as a 503).
    #[error("event stream at capacity: {max_clients} clients already connected")]
    AtCapacity {
        /// The configured client cap.
        max_clients: usize,
    },
}

/// Result alias for [`EventsError`].
pub type EventsResult<T> = Result<T, EventsError>;
