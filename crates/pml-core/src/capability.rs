//! The capability record data model (§3 Capability record, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CapabilityFqdn, ToolId};
use crate::tool::Routing;

/// Visibility scope of a capability, from narrowest to widest (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible only to its creator.
    Private,
    /// Visible to all members of the owning project.
    Project,
    /// Visible to all members of the owning org.
    Org,
    /// Visible to anyone (§4.6 step 3, public fallback resolution).
    Public,
}

/// An immutable, content-addressed, versioned capability (§3, §4.6).
///
/// `fqdn` is set once at construction and never mutated; [`rename`] in
/// `pml-capabilities` produces a *new* `CapabilityRecord` rather than
/// mutating this one, upholding the "fqdn is immutable" invariant.
///
/// [`rename`]: https://docs.rs/pml-capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRecord {
    fqdn: CapabilityFqdn,
    /// Mutable display name used for name resolution (§4.6 step 1).
    pub display_name: String,
    /// Owning organization.
    pub org: String,
    /// Owning project.
    pub project: String,
    /// Namespace segment of the FQDN.
    pub namespace: String,
    /// Action segment of the FQDN.
    pub action: String,
    /// Content hash of `code` (full, not truncated).
    pub hash: String,
    /// Monotonically increasing version, bumped on every rename (§4.6 step 2).
    pub version: u32,
    /// Visibility scope.
    pub visibility: Visibility,
    /// Declared routing for the capability's own execution.
    pub routing: Routing,
    /// JSON schema for the capability's call arguments.
    pub input_schema: Value,
    /// Tool ids invoked by this capability's code.
    pub tools_used: Vec<ToolId>,
    /// Total number of invocations.
    pub usage_count: u64,
    /// Number of invocations that succeeded.
    pub success_count: u64,
    /// Cumulative latency across all invocations, in milliseconds.
    pub total_latency_ms: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CapabilityRecord {
    /// Construct a brand-new capability record, deriving its FQDN from
    /// `code`'s content hash (§4.6 FQDN generation).
    #[must_use]
    pub fn new(
        org: impl Into<String>,
        project: impl Into<String>,
        namespace: impl Into<String>,
        action: impl Into<String>,
        display_name: impl Into<String>,
        code: &[u8],
        routing: Routing,
        input_schema: Value,
    ) -> Self {
        let org = org.into();
        let project = project.into();
        let namespace = namespace.into();
        let action = action.into();
        let fqdn = CapabilityFqdn::build(&org, &project, &namespace, &action, code);
        let hash = blake3::hash(code).to_hex().to_string();
        let now = Utc::now();
        Self {
            fqdn,
            display_name: display_name.into(),
            org,
            project,
            namespace,
            action,
            hash,
            version: 1,
            visibility: Visibility::Private,
            routing,
            input_schema,
            tools_used: Vec::new(),
            usage_count: 0,
            success_count: 0,
            total_latency_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from persisted fields (the `RecordStore` boundary
    /// never re-derives the fqdn — it is read back verbatim).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        fqdn: CapabilityFqdn,
        display_name: String,
        org: String,
        project: String,
        namespace: String,
        action: String,
        hash: String,
        version: u32,
        visibility: Visibility,
        routing: Routing,
        input_schema: Value,
        tools_used: Vec<ToolId>,
        usage_count: u64,
        success_count: u64,
        total_latency_ms: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fqdn,
            display_name,
            org,
            project,
            namespace,
            action,
            hash,
            version,
            visibility,
            routing,
            input_schema,
            tools_used,
            usage_count,
            success_count,
            total_latency_ms,
            created_at,
            updated_at,
        }
    }

    /// The immutable fqdn.
    #[must_use]
    pub fn fqdn(&self) -> &CapabilityFqdn {
        &self.fqdn
    }

    /// `successCount / usageCount`, derived rather than stored (§3 invariants).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.usage_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.usage_count as f64
        }
    }

    /// Average latency in milliseconds, or `0` with no recorded usage.
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        if self.usage_count == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.usage_count as f64
        }
    }

    /// Record one invocation outcome (§4.6 Usage recording).
    ///
    /// # Panics
    ///
    /// Never panics; saturates rather than overflowing the counters.
    pub fn record_usage(&mut self, success: bool, latency_ms: u64) {
        self.usage_count = self.usage_count.saturating_add(1);
        if success {
            self.success_count = self.success_count.saturating_add(1);
        }
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
        self.updated_at = Utc::now();
        debug_assert!(self.success_count <= self.usage_count);
    }

    /// Build the record that results from renaming this one to
    /// `new_display_name`: same identity fields, a fresh fqdn derived from
    /// the *same code hash* (hash collisions across namespace/action are
    /// permitted per §4.6), and an incremented version.
    #[must_use]
    pub fn renamed(&self, new_namespace: &str, new_action: &str, new_display_name: &str) -> Self {
        let fqdn = CapabilityFqdn::parse(format!(
            "{}.{}.{}.{}.{}",
            self.org,
            self.project,
            new_namespace,
            new_action,
            self.fqdn.short_hash()
        ))
        .expect("components and existing short hash always form a valid fqdn");
        Self {
            fqdn,
            display_name: new_display_name.to_string(),
            namespace: new_namespace.to_string(),
            action: new_action.to_string(),
            version: self.version.saturating_add(1),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}
