//! Session-scoped approval state consulted by the RESUME pre-action
//! table (§4.3). Tracks what the human has already approved for the
//! lifetime of the current gateway process — cleared on restart along
//! with the rest of the pending-workflow state.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use pml_core::ids::ToolId;

/// Per-session record of prior human approvals, consulted so the same
/// tool/capability is not re-prompted for every call within a session.
#[derive(Debug, Default)]
pub struct SessionApprovals {
    approved_tools: RwLock<HashSet<ToolId>>,
    approved_hashes: RwLock<HashSet<(String, String)>>,
}

impl SessionApprovals {
    /// A session with nothing yet approved.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `tool_id` approved for the remainder of the session
    /// (`tool_permission` pre-action, §4.3).
    pub async fn approve_tool(&self, tool_id: ToolId) {
        self.approved_tools.write().await.insert(tool_id);
    }

    /// Whether `tool_id` was previously approved this session.
    pub async fn is_tool_approved(&self, tool_id: &ToolId) -> bool {
        self.approved_tools.read().await.contains(tool_id)
    }

    /// Record a new content hash as approved for a capability's FQDN
    /// base (`integrity` pre-action, §4.3) — `base` is the
    /// `org.project.namespace.action` prefix without the short hash.
    pub async fn approve_hash(&self, base: impl Into<String>, hash: impl Into<String>) {
        self.approved_hashes.write().await.insert((base.into(), hash.into()));
    }

    /// Whether `hash` was previously approved for capability base `base`.
    pub async fn is_hash_approved(&self, base: &str, hash: &str) -> bool {
        self.approved_hashes
            .read()
            .await
            .contains(&(base.to_string(), hash.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tool_approval_is_remembered() {
        let session = SessionApprovals::new();
        let tool_id = ToolId::new("pay", "charge");
        assert!(!session.is_tool_approved(&tool_id).await);
        session.approve_tool(tool_id.clone()).await;
        assert!(session.is_tool_approved(&tool_id).await);
    }

    #[tokio::test]
    async fn hash_approval_is_scoped_to_base_and_hash() {
        let session = SessionApprovals::new();
        session.approve_hash("alice.default.fs.read", "a1b2").await;
        assert!(session.is_hash_approved("alice.default.fs.read", "a1b2").await);
        assert!(!session.is_hash_approved("alice.default.fs.read", "c3d4").await);
        assert!(!session.is_hash_approved("alice.default.fs.write", "a1b2").await);
    }
}
