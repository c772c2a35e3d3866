//! Per-session suggestion cache consulted when a host later sends
//! `accept_suggestion` (§4.8). Session-scoped approval state proper
//! (`tool_permission`/`integrity`) lives in
//! [`pml_workflow::session::SessionApprovals`] — this registry only
//! bridges the gap that collaborator doesn't cover: recovering the
//! confidence a suggestion was offered at once it's accepted.

use dashmap::DashMap;

#[derive(Debug, Default)]
struct SessionState {
    pending_suggestions: std::collections::HashMap<String, f64>,
}

/// Process-local, like the pending workflow store it complements — a
/// restart loses all cached suggestions along with the workflows they
/// belong to.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionState>,
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a cloud suggestion's confidence, keyed by its call name, so
    /// a later `accept_suggestion` on the same session can feed the
    /// adaptive-threshold controller with the confidence it was offered
    /// at (§4.8) — the `execute` input schema's `accept_suggestion` only
    /// carries the call name and arguments, not the confidence the
    /// cloud originally attached to it.
    pub fn record_suggestion(&self, session_id: &str, call_name: &str, confidence: f64) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .pending_suggestions
            .insert(call_name.to_string(), confidence);
    }

    /// Consume and return a previously-cached suggestion confidence.
    pub fn take_suggestion_confidence(&self, session_id: &str, call_name: &str) -> Option<f64> {
        self.sessions.get_mut(session_id)?.pending_suggestions.remove(call_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_confidence_is_scoped_to_its_session() {
        let registry = SessionRegistry::new();
        registry.record_suggestion("session-a", "fs:read", 0.82);
        assert_eq!(registry.take_suggestion_confidence("session-b", "fs:read"), None);
    }

    #[test]
    fn suggestion_confidence_is_consumed_once() {
        let registry = SessionRegistry::new();
        registry.record_suggestion("session-a", "fs:read", 0.82);
        assert_eq!(registry.take_suggestion_confidence("session-a", "fs:read"), Some(0.82));
        assert_eq!(registry.take_suggestion_confidence("session-a", "fs:read"), None);
    }
}
