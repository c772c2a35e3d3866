//! The sliding window of execution records (§4.8).

use std::collections::VecDeque;

use pml_core::execution::{ExecutionMode, ExecutionRecord};

/// Default window size (§4.8): the last 50 execution records.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// A fixed-capacity FIFO window over the most recent execution records.
/// Pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    records: VecDeque<ExecutionRecord>,
}

impl SlidingWindow {
    /// A window holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Push a new record, evicting the oldest if at capacity.
    pub fn push(&mut self, record: ExecutionRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the window holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// False-positive rate: failed speculative executions / total
    /// speculative executions in the window. `0.0` if there are none.
    #[must_use]
    pub fn false_positive_rate(&self) -> f64 {
        let speculative: Vec<&ExecutionRecord> = self
            .records
            .iter()
            .filter(|r| r.mode == ExecutionMode::Speculative)
            .collect();
        if speculative.is_empty() {
            return 0.0;
        }
        let failed = speculative.iter().filter(|r| !r.success).count();
        #[allow(clippy::cast_precision_loss)]
        let rate = failed as f64 / speculative.len() as f64;
        rate
    }

    /// False-negative rate, per §4.8: among `Suggestion`-mode records,
    /// the fraction that were accepted *and* had confidence at or above
    /// `threshold - 0.1` — i.e. suggestions that were clearly good
    /// enough to have run speculatively instead of merely suggested.
    #[must_use]
    pub fn false_negative_rate(&self, threshold: f64) -> f64 {
        let suggestions: Vec<&ExecutionRecord> = self
            .records
            .iter()
            .filter(|r| r.mode == ExecutionMode::Suggestion)
            .collect();
        if suggestions.is_empty() {
            return 0.0;
        }
        let floor = threshold - 0.1;
        let accepted_high_confidence = suggestions
            .iter()
            .filter(|r| r.user_accepted == Some(true) && r.confidence >= floor)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let rate = accepted_high_confidence as f64 / suggestions.len() as f64;
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(mode: ExecutionMode, success: bool, confidence: f64, accepted: Option<bool>) -> ExecutionRecord {
        ExecutionRecord {
            confidence,
            mode,
            success,
            user_accepted: accepted,
            execution_time_ms: 10,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut window = SlidingWindow::new(2);
        window.push(record(ExecutionMode::Explicit, true, 0.9, None));
        window.push(record(ExecutionMode::Explicit, true, 0.9, None));
        window.push(record(ExecutionMode::Explicit, false, 0.9, None));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn false_positive_rate_counts_only_speculative() {
        let mut window = SlidingWindow::new(10);
        window.push(record(ExecutionMode::Speculative, false, 0.8, None));
        window.push(record(ExecutionMode::Speculative, true, 0.8, None));
        window.push(record(ExecutionMode::Explicit, false, 0.8, None));
        assert!((window.false_positive_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn false_negative_rate_requires_acceptance_and_confidence_floor() {
        let mut window = SlidingWindow::new(10);
        window.push(record(ExecutionMode::Suggestion, true, 0.65, Some(true)));
        window.push(record(ExecutionMode::Suggestion, true, 0.50, Some(true)));
        window.push(record(ExecutionMode::Suggestion, true, 0.90, Some(false)));
        // threshold 0.70 -> floor 0.60; only the 0.65 entry qualifies.
        assert!((window.false_negative_rate(0.70) - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn empty_window_has_zero_rates() {
        let window = SlidingWindow::new(10);
        assert!((window.false_positive_rate() - 0.0).abs() < f64::EPSILON);
        assert!((window.false_negative_rate(0.7) - 0.0).abs() < f64::EPSILON);
    }
}
