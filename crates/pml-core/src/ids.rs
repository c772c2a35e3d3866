//! Newtype identifiers used throughout the gateway.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

static FQDN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_-]+\.[a-z0-9_-]+\.[a-z0-9_-]+\.[a-z0-9_-]+\.[a-f0-9]{4}$")
        .expect("static fqdn pattern is valid")
});

/// A workflow identifier: a UUIDv7, which also serves as the workflow's
/// trace id (§3 Pending workflow entry, GLOSSARY "Workflow").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Generate a fresh workflow id (UUIDv7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkflowId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidWorkflowId(e.to_string()))
    }
}

/// A fully-qualified capability name:
/// `<org>.<project>.<namespace>.<action>.<shortHash>` (§3, §4.6, §6).
///
/// Immutable once constructed; renaming a capability produces a new
/// `CapabilityFqdn`, never mutates an existing one in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityFqdn(String);

impl CapabilityFqdn {
    /// Validate and wrap a raw FQDN string.
    pub fn parse(raw: impl Into<String>) -> CoreResult<Self> {
        let raw = raw.into();
        if FQDN_PATTERN.is_match(&raw) {
            Ok(Self(raw))
        } else {
            Err(CoreError::InvalidFqdn(raw))
        }
    }

    /// Build a capability FQDN from its components and a content hash,
    /// per §4.6: `shortHash = first-4-hex(contentHash(code))`.
    #[must_use]
    pub fn build(org: &str, project: &str, namespace: &str, action: &str, code: &[u8]) -> Self {
        let full_hash = blake3::hash(code);
        let short_hash = &full_hash.to_hex()[..4];
        let raw = format!("{org}.{project}.{namespace}.{action}.{short_hash}");
        Self(raw)
    }

    /// The org segment.
    #[must_use]
    pub fn org(&self) -> &str {
        self.segment(0)
    }

    /// The project segment.
    #[must_use]
    pub fn project(&self) -> &str {
        self.segment(1)
    }

    /// The namespace segment.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.segment(2)
    }

    /// The action segment.
    #[must_use]
    pub fn action(&self) -> &str {
        self.segment(3)
    }

    /// The trailing 4-hex short hash segment.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.segment(4)
    }

    fn segment(&self, index: usize) -> &str {
        self.0
            .split('.')
            .nth(index)
            .expect("fqdn was validated against FQDN_PATTERN at construction")
    }

    /// The raw string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityFqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CapabilityFqdn {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

/// A tool identifier in `server:name` form (§3 Tool descriptor).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Construct a tool id from a server id and tool name.
    #[must_use]
    pub fn new(server: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self(format!("{}:{}", server.as_ref(), name.as_ref()))
    }

    /// Parse a `server:name` string.
    pub fn parse(raw: impl Into<String>) -> CoreResult<Self> {
        let raw = raw.into();
        match raw.split_once(':') {
            Some((server, name)) if !server.is_empty() && !name.is_empty() => Ok(Self(raw)),
            _ => Err(CoreError::InvalidToolId(raw)),
        }
    }

    /// The server id portion.
    #[must_use]
    pub fn server(&self) -> &str {
        self.0
            .split_once(':')
            .expect("tool id was validated at construction")
            .0
    }

    /// The tool name portion.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .split_once(':')
            .expect("tool id was validated at construction")
            .1
    }

    /// The raw `server:name` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ToolId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_round_trips_through_display() {
        let id = WorkflowId::new();
        let parsed: WorkflowId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn fqdn_rejects_malformed_strings() {
        assert!(CapabilityFqdn::parse("alice.default.fs.read.a1b2").is_ok());
        assert!(CapabilityFqdn::parse("alice.default.fs.read").is_err());
        assert!(CapabilityFqdn::parse("Alice.default.fs.read.a1b2").is_err());
        assert!(CapabilityFqdn::parse("alice.default.fs.read.zzzz").is_err());
    }

    #[test]
    fn fqdn_build_matches_pattern_and_segments() {
        let fqdn = CapabilityFqdn::build("alice", "default", "fs", "read", b"return 1;");
        assert_eq!(fqdn.org(), "alice");
        assert_eq!(fqdn.project(), "default");
        assert_eq!(fqdn.namespace(), "fs");
        assert_eq!(fqdn.action(), "read");
        assert_eq!(fqdn.short_hash().len(), 4);
    }

    #[test]
    fn same_code_shares_short_hash() {
        let a = CapabilityFqdn::build("alice", "default", "fs", "read", b"same code");
        let b = CapabilityFqdn::build("alice", "default", "viz", "render", b"same code");
        assert_eq!(a.short_hash(), b.short_hash());
    }

    #[test]
    fn tool_id_splits_server_and_name() {
        let id = ToolId::new("fs", "read");
        assert_eq!(id.server(), "fs");
        assert_eq!(id.name(), "read");
        assert_eq!(id.as_str(), "fs:read");
        assert!(ToolId::parse("malformed").is_err());
    }
}
