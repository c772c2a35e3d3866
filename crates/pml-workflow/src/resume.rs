//! The RESUME pre-action table (§4.3): what happens immediately before
//! an approved, paused workflow is re-invoked, keyed by approval kind.

use std::path::Path;

use pml_core::workflow::ApprovalKind;

use crate::session::SessionApprovals;

/// What the orchestrator must do, concretely, before replaying a
/// resumed workflow's code — one [`ApprovalKind`] maps to exactly one
/// pre-action (§4.3 table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreAction {
    /// The tool id is now approved for the session; nothing further to load.
    ToolApproved,
    /// Re-read the workspace's env file — a key landed out-of-band.
    ReloadEnvFile,
    /// Record the new content hash as approved for the capability's FQDN base.
    ApproveHash {
        /// `org.project.namespace.action`, without the trailing short hash.
        fqdn_base: String,
        /// The newly-approved content hash.
        hash: String,
    },
    /// Nothing to do — the dependency installer already ran.
    Proceed,
}

/// Compute the pre-action for `kind`, given the paused entry's payload
/// and originating tool, and apply any session-state side effect.
///
/// `payload` is the kind-specific JSON carried on the
/// [`pml_core::workflow::PendingEntry`]; for `integrity` it is expected
/// to carry `{"fqdn_base": ..., "hash": ...}`.
pub async fn apply_pre_action(
    kind: ApprovalKind,
    tool_id: &pml_core::ids::ToolId,
    payload: &serde_json::Value,
    session: &SessionApprovals,
) -> PreAction {
    match kind {
        ApprovalKind::ToolPermission => {
            session.approve_tool(tool_id.clone()).await;
            PreAction::ToolApproved
        },
        ApprovalKind::ApiKeyRequired | ApprovalKind::OauthConnect => PreAction::ReloadEnvFile,
        ApprovalKind::Integrity => {
            let fqdn_base = payload
                .get("fqdn_base")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let hash = payload
                .get("hash")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            session.approve_hash(fqdn_base.clone(), hash.clone()).await;
            PreAction::ApproveHash { fqdn_base, hash }
        },
        ApprovalKind::Dependency => PreAction::Proceed,
    }
}

/// Read the workspace's env file, if present, returning its raw
/// `KEY=VALUE` lines. Used by the `ReloadEnvFile` pre-action's caller
/// after an out-of-band credential lands.
///
/// # Errors
///
/// Returns the underlying I/O error if the file exists but cannot be read.
/// A missing file is not an error — it returns an empty list, matching a
/// workspace that has never needed credentials.
pub async fn read_env_file(workspace_root: &Path) -> std::io::Result<Vec<(String, String)>> {
    let path = workspace_root.join(".env");
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::ids::ToolId;

    #[tokio::test]
    async fn tool_permission_marks_the_tool_approved() {
        let session = SessionApprovals::new();
        let tool_id = ToolId::new("pay", "charge");
        let action = apply_pre_action(
            ApprovalKind::ToolPermission,
            &tool_id,
            &serde_json::json!({}),
            &session,
        )
        .await;
        assert_eq!(action, PreAction::ToolApproved);
        assert!(session.is_tool_approved(&tool_id).await);
    }

    #[tokio::test]
    async fn integrity_records_the_new_hash() {
        let session = SessionApprovals::new();
        let tool_id = ToolId::new("fs", "read");
        let payload = serde_json::json!({"fqdn_base": "alice.default.fs.read", "hash": "deadbeef"});
        let action = apply_pre_action(ApprovalKind::Integrity, &tool_id, &payload, &session).await;
        assert_eq!(
            action,
            PreAction::ApproveHash {
                fqdn_base: "alice.default.fs.read".to_string(),
                hash: "deadbeef".to_string(),
            }
        );
        assert!(session.is_hash_approved("alice.default.fs.read", "deadbeef").await);
    }

    #[tokio::test]
    async fn dependency_is_a_no_op() {
        let session = SessionApprovals::new();
        let tool_id = ToolId::new("pkg", "install");
        let action = apply_pre_action(ApprovalKind::Dependency, &tool_id, &serde_json::json!({}), &session).await;
        assert_eq!(action, PreAction::Proceed);
    }

    #[tokio::test]
    async fn missing_env_file_is_not_an_error() {
        let dir = std::env::temp_dir().join("pml-workflow-test-nonexistent-workspace");
        let result = read_env_file(&dir).await.unwrap();
        assert!(result.is_empty());
    }
}
