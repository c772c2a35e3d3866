//! PML Threshold - the adaptive-threshold controller (§4.8).
//!
//! Maintains a sliding window of execution outcomes and re-tunes the
//! suggestion threshold from its false-positive/false-negative rates.
//! The reliability multiplier applied to candidate ranking lives in
//! [`pml_core::execution`] since it is a pure function of success rate
//! alone, independent of this controller's window state; re-exported
//! here for callers that only depend on `pml-threshold`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod controller;
pub mod error;
pub mod window;

pub use controller::{
    ThresholdController, ThresholdSnapshot, DEFAULT_MAX_THRESHOLD, DEFAULT_MIN_THRESHOLD, LEARNING_RATE,
};
pub use error::{ThresholdError, ThresholdResult};
pub use pml_core::execution::{final_score, reliability_multiplier, MAX_FINAL_SCORE};
pub use window::{SlidingWindow, DEFAULT_WINDOW_SIZE};
