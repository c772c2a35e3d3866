//! The adaptive-threshold controller (§4.8): maintains
//! `explicitThreshold` / `suggestionThreshold` and updates the latter
//! from a sliding window of execution outcomes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use pml_core::execution::ExecutionRecord;

use crate::error::{ThresholdError, ThresholdResult};
use crate::window::{SlidingWindow, DEFAULT_WINDOW_SIZE};

/// Learning rate applied to the threshold update (§4.8: `η = 0.05`).
pub const LEARNING_RATE: f64 = 0.05;
/// Lower bound both thresholds are clamped to (§4.8, §3 invariant).
pub const DEFAULT_MIN_THRESHOLD: f64 = 0.40;
/// Upper bound both thresholds are clamped to (§4.8, §3 invariant).
pub const DEFAULT_MAX_THRESHOLD: f64 = 0.90;
/// Minimum window occupancy before updates are considered (§4.8).
const MIN_ENTRIES_FOR_UPDATE: usize = 20;
/// Update cadence: re-evaluate every Nth pushed record (§4.8).
const UPDATE_EVERY_N_RECORDS: u64 = 10;
/// FPR above which the suggestion threshold is raised (§4.8).
const FPR_TRIGGER: f64 = 0.20;
/// FNR above which the suggestion threshold is lowered (§4.8).
const FNR_TRIGGER: f64 = 0.30;

/// A point-in-time view of the controller's state, suitable for a
/// health/metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    /// The fixed explicit-execution threshold.
    pub explicit_threshold: f64,
    /// The adaptively-tuned suggestion threshold.
    pub suggestion_threshold: f64,
    /// Records currently held in the sliding window.
    pub window_len: usize,
    /// Records pushed since the controller was constructed.
    pub total_pushed: u64,
}

struct Inner {
    window: SlidingWindow,
    explicit_threshold: f64,
    suggestion_threshold: f64,
    min_threshold: f64,
    max_threshold: f64,
    total_pushed: u64,
}

/// Owns the sliding window and the two thresholds it governs. Cheap to
/// clone (wraps an `Arc`); safe to share across concurrent workflows.
#[derive(Clone)]
pub struct ThresholdController {
    inner: Arc<Mutex<Inner>>,
}

impl ThresholdController {
    /// Build a controller with the default window size and bounds.
    #[must_use]
    pub fn new(explicit_threshold: f64, suggestion_threshold: f64) -> Self {
        Self::with_bounds(
            explicit_threshold,
            suggestion_threshold,
            DEFAULT_MIN_THRESHOLD,
            DEFAULT_MAX_THRESHOLD,
            DEFAULT_WINDOW_SIZE,
        )
        .expect("default bounds are always valid")
    }

    /// Build a controller with explicit bounds and window size.
    ///
    /// # Errors
    ///
    /// Returns [`ThresholdError::InvalidBounds`] if `min > max`.
    pub fn with_bounds(
        explicit_threshold: f64,
        suggestion_threshold: f64,
        min_threshold: f64,
        max_threshold: f64,
        window_size: usize,
    ) -> ThresholdResult<Self> {
        if min_threshold > max_threshold {
            return Err(ThresholdError::InvalidBounds { min: min_threshold, max: max_threshold });
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                window: SlidingWindow::new(window_size),
                explicit_threshold,
                suggestion_threshold: suggestion_threshold.clamp(min_threshold, max_threshold),
                min_threshold,
                max_threshold,
                total_pushed: 0,
            })),
        })
    }

    /// Record an execution outcome and, on the update cadence, re-tune
    /// `suggestionThreshold` (§4.8).
    pub async fn record(&self, execution_record: ExecutionRecord) {
        let mut inner = self.inner.lock().await;
        inner.window.push(execution_record);
        inner.total_pushed = inner.total_pushed.saturating_add(1);

        if inner.total_pushed % UPDATE_EVERY_N_RECORDS != 0 || inner.window.len() < MIN_ENTRIES_FOR_UPDATE {
            return;
        }

        let fpr = inner.window.false_positive_rate();
        let fnr = inner.window.false_negative_rate(inner.suggestion_threshold);
        let before = inner.suggestion_threshold;
        let min = inner.min_threshold;
        let max = inner.max_threshold;

        let updated = if fpr > FPR_TRIGGER {
            (before + LEARNING_RATE * fpr).clamp(min, max)
        } else if fnr > FNR_TRIGGER {
            (before - LEARNING_RATE * fnr).clamp(min, max)
        } else {
            before
        };

        if (updated - before).abs() > f64::EPSILON {
            info!(before, after = updated, fpr, fnr, "adaptive suggestion threshold updated");
        }
        inner.suggestion_threshold = updated;
    }

    /// The current suggestion threshold.
    pub async fn suggestion_threshold(&self) -> f64 {
        self.inner.lock().await.suggestion_threshold
    }

    /// The fixed explicit threshold. §9 open question: the source never
    /// adjusts this value despite referencing it — treated as a static
    /// configuration knob here, not part of the learning loop.
    pub async fn explicit_threshold(&self) -> f64 {
        self.inner.lock().await.explicit_threshold
    }

    /// A snapshot of the controller's current state.
    pub async fn snapshot(&self) -> ThresholdSnapshot {
        let inner = self.inner.lock().await;
        ThresholdSnapshot {
            explicit_threshold: inner.explicit_threshold,
            suggestion_threshold: inner.suggestion_threshold,
            window_len: inner.window.len(),
            total_pushed: inner.total_pushed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::execution::ExecutionMode;

    fn failed_speculative() -> ExecutionRecord {
        ExecutionRecord::new(0.8, ExecutionMode::Speculative, false, None, 5)
    }

    #[tokio::test]
    async fn threshold_increases_under_sustained_failures() {
        let controller = ThresholdController::new(0.85, 0.70);
        for _ in 0..20 {
            controller.record(failed_speculative()).await;
        }
        let threshold = controller.suggestion_threshold().await;
        assert!(threshold > 0.70, "threshold should have increased: {threshold}");
        assert!(threshold <= DEFAULT_MAX_THRESHOLD);
    }

    #[tokio::test]
    async fn threshold_stays_within_bounds_under_prolonged_pressure() {
        let controller = ThresholdController::new(0.85, 0.89);
        for _ in 0..200 {
            controller.record(failed_speculative()).await;
        }
        let threshold = controller.suggestion_threshold().await;
        assert!(threshold <= DEFAULT_MAX_THRESHOLD);
        assert!(threshold >= DEFAULT_MIN_THRESHOLD);
    }

    #[tokio::test]
    async fn update_does_not_trigger_before_window_fills() {
        let controller = ThresholdController::new(0.85, 0.70);
        for _ in 0..9 {
            controller.record(failed_speculative()).await;
        }
        assert!((controller.suggestion_threshold().await - 0.70).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        let result = ThresholdController::with_bounds(0.85, 0.70, 0.9, 0.4, 50);
        assert!(matches!(result, Err(ThresholdError::InvalidBounds { .. })));
    }
}
