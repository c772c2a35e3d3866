//! Composite UI generator error taxonomy.

use thiserror::Error;

/// Errors from composite UI assembly. The generator is documented as
/// total (§4.9) — these exist for malformed caller input, not for
/// degraded-but-valid states like an unknown sync-rule tool, which fall
/// back to slot 0 with a logged warning instead of erroring.
#[derive(Debug, Error)]
pub enum UiError {
    /// Two collected resources claimed the same slot index.
    #[error("duplicate slot {0} among collected UI resources")]
    DuplicateSlot(usize),
}

/// Result alias for [`UiError`].
pub type UiResult<T> = Result<T, UiError>;
