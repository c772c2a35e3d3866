//! Adaptive-threshold controller error taxonomy.

use thiserror::Error;

/// Errors from the adaptive-threshold controller.
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// A configured bound was nonsensical (e.g. `min > max`).
    #[error("invalid threshold bounds: min={min}, max={max}")]
    InvalidBounds {
        /// The configured minimum.
        min: f64,
        /// The configured maximum.
        max: f64,
    },
}

/// Result alias for [`ThresholdError`].
pub type ThresholdResult<T> = Result<T, ThresholdError>;
