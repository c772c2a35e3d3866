//! Capability registry error taxonomy (§4.6).

use thiserror::Error;

/// Errors from the capability registry and its backing store.
#[derive(Debug, Error)]
pub enum CapabilitiesError {
    /// No record exists for the given fqdn.
    #[error("capability not found: {0}")]
    NotFound(String),

    /// `rename` was asked to operate on a capability that does not exist.
    #[error("cannot rename, no such capability: {0}")]
    RenameSourceMissing(String),

    /// The backing store returned an error.
    #[error("capability store error: {0}")]
    Storage(String),

    /// A record or alias failed to (de)serialize crossing the store boundary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for [`CapabilitiesError`].
pub type CapabilitiesResult<T> = Result<T, CapabilitiesError>;
