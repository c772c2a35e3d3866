//! The permission escalation engine proper (§4.7): turns a sandbox
//! denial message into a minimal escalation suggestion, or nothing.

use pml_core::tool::PermissionSet;

use crate::graph::resolve_target;
use crate::operation::{classify, OperationKind};

/// A proposed minimal escalation for a denied tool call (§4.7 output).
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationSuggestion {
    /// The permission set the capability currently holds.
    pub current_set: PermissionSet,
    /// The permission set that would unblock the denied operation.
    pub requested_set: PermissionSet,
    /// A human-readable reason, naming the operation and resource.
    pub reason: String,
    /// The operation kind that was denied.
    pub detected_operation: OperationKind,
    /// Confidence in `[0, 0.95]` that this suggestion is correct (§4.7 step 5).
    pub confidence: f64,
}

fn looks_like_https(resource: &str) -> bool {
    resource.starts_with("https://") || resource.ends_with(":443") || resource.contains(":443/")
}

fn looks_absolute_path(resource: &str) -> bool {
    resource.starts_with('/') || resource.starts_with("~/")
}

/// Inspect `error_message` and propose the minimal escalation that
/// would unblock it, or `None` if the message doesn't match a known
/// denial shape, the operation is security-critical, or no reachable
/// set actually provides the operation (§4.7 steps 1-5).
#[must_use]
pub fn suggest_escalation(error_message: &str, current_set: PermissionSet) -> Option<EscalationSuggestion> {
    let classified = classify(error_message)?;

    if classified.kind.is_security_critical() {
        return None;
    }

    let requested_set = resolve_target(current_set, classified.kind)?;

    let mut confidence: f64 = 0.7;
    if !classified.resource.is_empty() {
        confidence += 0.15;
    }
    if classified.kind == OperationKind::Net && looks_like_https(&classified.resource) {
        confidence += 0.10;
    }
    if matches!(classified.kind, OperationKind::Read | OperationKind::Write)
        && looks_absolute_path(&classified.resource)
    {
        confidence += 0.05;
    }
    confidence = confidence.min(0.95);

    Some(EscalationSuggestion {
        current_set,
        requested_set,
        reason: format!(
            "{:?} access to {} was denied under the current permission set",
            classified.kind, classified.resource
        ),
        detected_operation: classified.kind,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_denial_suggests_network_api_with_https_bonus() {
        let suggestion = suggest_escalation(
            "PermissionDenied: Requires net access to api.example.com:443",
            PermissionSet::Minimal,
        )
        .expect("should classify");
        assert_eq!(suggestion.requested_set, PermissionSet::NetworkApi);
        assert_eq!(suggestion.detected_operation, OperationKind::Net);
        assert!((suggestion.confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn run_denial_never_auto_escalates() {
        let suggestion = suggest_escalation(
            "PermissionDenied: Requires run access to /bin/sh",
            PermissionSet::Minimal,
        );
        assert!(suggestion.is_none());
    }

    #[test]
    fn unmatched_message_yields_no_suggestion() {
        assert!(suggest_escalation("boom", PermissionSet::Minimal).is_none());
    }

    #[test]
    fn absolute_path_read_gets_path_and_absolute_bonus() {
        let suggestion = suggest_escalation(
            "Requires read access to /etc/passwd",
            PermissionSet::Minimal,
        )
        .expect("should classify");
        assert_eq!(suggestion.requested_set, PermissionSet::Readonly);
        assert!((suggestion.confidence - 0.90).abs() < f64::EPSILON);
    }
}
