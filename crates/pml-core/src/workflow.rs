//! The pending-workflow entry shape (§3 Pending workflow entry, §4.5).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CapabilityFqdn, ToolId, WorkflowId};

/// The default TTL for a pending workflow entry (§3, §4.5): 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// The kind of human-in-the-loop approval a paused workflow is waiting on
/// (§3, §4.3 RESUME pre-action table, §6 approval-required envelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// A tool invocation needs permission granted for the session.
    ToolPermission,
    /// An API key is required and must be supplied out-of-band.
    ApiKeyRequired,
    /// The capability's code hash changed and needs re-approval.
    Integrity,
    /// An OAuth connection must be completed out-of-band.
    OauthConnect,
    /// A dependency installer must run before continuing.
    Dependency,
}

/// A DAG task as carried in the cloud's `execute_locally` envelope (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagTask {
    /// Task id, unique within the DAG.
    pub id: String,
    /// The tool this task invokes.
    pub tool: String,
    /// Static arguments for the call, if known ahead of execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Ids of tasks that must complete before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// The task's layer index within the DAG (§3).
    pub layer_index: u32,
}

/// Suspended state for one workflow, held by the pending-workflow store
/// between an approval-emitting tool call and its continuation (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    /// The workflow id (= trace id).
    pub workflow_id: WorkflowId,
    /// The code to re-execute on resume.
    pub code: String,
    /// The tool id whose call triggered the approval checkpoint.
    pub originating_tool: ToolId,
    /// What kind of approval is being waited on.
    pub approval_kind: ApprovalKind,
    /// Kind-specific payload (e.g. the denied permission set, the FQDN
    /// whose hash changed, the OAuth provider name).
    pub payload: Value,
    /// Tool id -> resolved capability fqdn map, as built by the orchestrator.
    pub tool_fqdn_map: HashMap<ToolId, CapabilityFqdn>,
    /// DAG tasks carried alongside the code, if the cloud supplied one.
    #[serde(default)]
    pub dag_tasks: Vec<DagTask>,
    /// When this entry was created (or last refreshed by `setWithId`).
    pub created_at: DateTime<Utc>,
    /// Time-to-live from `created_at`.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl PendingEntry {
    /// Whether `now - created_at > ttl` (§3 invariant, §8 property).
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match i64::try_from(self.ttl.as_secs()) {
            Ok(ttl_secs) => age.num_seconds() > ttl_secs,
            Err(_) => false,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(ttl: Duration, created_at: DateTime<Utc>) -> PendingEntry {
        PendingEntry {
            workflow_id: WorkflowId::new(),
            code: "return 1;".to_string(),
            originating_tool: ToolId::new("pay", "charge"),
            approval_kind: ApprovalKind::ToolPermission,
            payload: serde_json::json!({}),
            tool_fqdn_map: HashMap::new(),
            dag_tasks: Vec::new(),
            created_at,
            ttl,
        }
    }

    #[test]
    fn entry_expires_strictly_after_ttl() {
        let created_at = Utc::now() - chrono::Duration::minutes(16);
        let entry = sample_entry(DEFAULT_TTL, created_at);
        assert!(entry.is_expired_at(Utc::now()));
    }

    #[test]
    fn entry_not_expired_within_ttl() {
        let created_at = Utc::now() - chrono::Duration::minutes(5);
        let entry = sample_entry(DEFAULT_TTL, created_at);
        assert!(!entry.is_expired_at(Utc::now()));
    }
}
