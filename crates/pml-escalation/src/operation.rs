//! The fixed operation-classification table (§4.7 step 1).

use std::sync::LazyLock;

use regex::Regex;

/// The kind of denied operation a sandbox error message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// A filesystem read was denied.
    Read,
    /// A filesystem write was denied.
    Write,
    /// An outbound network connection was denied.
    Net,
    /// An environment variable read was denied.
    Env,
    /// A subprocess spawn was denied. Security-critical: never auto-escalated.
    Run,
    /// A foreign-function call was denied. Security-critical: never auto-escalated.
    Ffi,
}

impl OperationKind {
    /// Whether this operation kind is security-critical (§4.7 step 2):
    /// `run` and `ffi` never auto-escalate regardless of confidence.
    #[must_use]
    pub fn is_security_critical(self) -> bool {
        matches!(self, OperationKind::Run | OperationKind::Ffi)
    }
}

/// One entry in the fixed classification table: an operation kind plus
/// the regex that recognizes it in a sandbox denial message. The regex's
/// first capture group is the denied resource (path, host, var name).
struct TableEntry {
    kind: OperationKind,
    pattern: &'static Regex,
}

static READ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+read\s+access\s+to\s+(\S+)").unwrap());
static WRITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+write\s+access\s+to\s+(\S+)").unwrap());
static NET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+net(?:work)?\s+access\s+to\s+(\S+)").unwrap());
static ENV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+env(?:ironment)?\s+access\s+(?:to|for)\s+(\S+)").unwrap());
static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+(?:run|subprocess|exec)\s+access\s+(?:to|for)\s+(\S+)").unwrap());
static FFI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brequires?\s+ffi\s+access\s+(?:to|for)\s+(\S+)").unwrap());

fn table() -> [TableEntry; 6] {
    [
        TableEntry { kind: OperationKind::Read, pattern: &READ_RE },
        TableEntry { kind: OperationKind::Write, pattern: &WRITE_RE },
        TableEntry { kind: OperationKind::Net, pattern: &NET_RE },
        TableEntry { kind: OperationKind::Env, pattern: &ENV_RE },
        TableEntry { kind: OperationKind::Run, pattern: &RUN_RE },
        TableEntry { kind: OperationKind::Ffi, pattern: &FFI_RE },
    ]
}

/// A classified denial: which operation was attempted and which
/// resource (path/host/var name) the message named, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// The operation kind matched.
    pub kind: OperationKind,
    /// The resource token captured, verbatim from the message.
    pub resource: String,
}

/// Match `message` against the fixed table, returning the first hit
/// (§4.7 step 1). Absent if no entry matches.
#[must_use]
pub fn classify(message: &str) -> Option<Classified> {
    for entry in table() {
        if let Some(captures) = entry.pattern.captures(message) {
            return Some(Classified {
                kind: entry.kind,
                resource: captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_net_denial_with_resource() {
        let classified = classify("PermissionDenied: Requires net access to api.example.com:443").unwrap();
        assert_eq!(classified.kind, OperationKind::Net);
        assert_eq!(classified.resource, "api.example.com:443");
    }

    #[test]
    fn classifies_read_denial() {
        let classified = classify("Requires read access to /etc/passwd").unwrap();
        assert_eq!(classified.kind, OperationKind::Read);
        assert_eq!(classified.resource, "/etc/passwd");
    }

    #[test]
    fn run_and_ffi_are_security_critical() {
        assert!(OperationKind::Run.is_security_critical());
        assert!(OperationKind::Ffi.is_security_critical());
        assert!(!OperationKind::Net.is_security_critical());
    }

    #[test]
    fn unmatched_message_is_absent() {
        assert!(classify("some unrelated error").is_none());
    }
}
