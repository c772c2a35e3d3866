//! The adaptive-threshold controller's execution record (§3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The mode under which a capability candidate was executed (§3, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Ran without explicit confirmation because confidence cleared the
    /// suggestion threshold (GLOSSARY "Speculative execution").
    Speculative,
    /// Surfaced to the user as a suggestion; ran only if accepted.
    Suggestion,
    /// Explicitly requested by name, bypassing threshold gating entirely.
    Explicit,
}

/// One execution outcome fed into the adaptive-threshold sliding window
/// (§3 Execution record, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Confidence score assigned to the candidate before execution, in `[0,1]`.
    pub confidence: f64,
    /// The mode under which it ran.
    pub mode: ExecutionMode,
    /// Whether the execution itself succeeded.
    pub success: bool,
    /// For `Suggestion` mode, whether the user accepted it. `None` for
    /// other modes.
    pub user_accepted: Option<bool>,
    /// Wall-clock execution time.
    pub execution_time_ms: u64,
    /// When this record was produced.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Construct a record stamped with the current time.
    #[must_use]
    pub fn new(
        confidence: f64,
        mode: ExecutionMode,
        success: bool,
        user_accepted: Option<bool>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            mode,
            success,
            user_accepted,
            execution_time_ms,
            timestamp: Utc::now(),
        }
    }
}

/// The cap applied to a candidate's final ranking score (§4.8).
pub const MAX_FINAL_SCORE: f64 = 0.95;

/// The reliability multiplier applied to a capability candidate's
/// `successRate` at search time (§4.6 search delegation, §4.8): a pure
/// function of the success rate alone, independent of the threshold
/// controller's sliding window.
#[must_use]
pub fn reliability_multiplier(success_rate: f64) -> f64 {
    if success_rate < 0.5 {
        0.1
    } else if success_rate > 0.9 {
        1.2
    } else {
        1.0
    }
}

/// `semanticScore × reliability`, capped at [`MAX_FINAL_SCORE`] (§4.6, §4.8).
#[must_use]
pub fn final_score(semantic_score: f64, success_rate: f64) -> f64 {
    (semantic_score * reliability_multiplier(success_rate)).min(MAX_FINAL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        let record = ExecutionRecord::new(1.5, ExecutionMode::Speculative, true, None, 10);
        assert!((record.confidence - 1.0).abs() < f64::EPSILON);
        let record = ExecutionRecord::new(-0.5, ExecutionMode::Speculative, true, None, 10);
        assert!(record.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn reliability_multiplier_penalizes_unreliable_candidates() {
        assert!((reliability_multiplier(0.2) - 0.1).abs() < f64::EPSILON);
        assert!((reliability_multiplier(0.7) - 1.0).abs() < f64::EPSILON);
        assert!((reliability_multiplier(0.95) - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn final_score_is_capped() {
        assert!((final_score(1.0, 0.95) - MAX_FINAL_SCORE).abs() < f64::EPSILON);
    }
}
