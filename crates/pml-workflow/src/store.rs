//! The pending-workflow store (§4.5): correlated suspend/resume state
//! with a TTL-bounded sweep, generalized from
//! `astrid-approval::allowance::store::AllowanceStore`'s in-memory
//! `RwLock<HashMap<_, _>>` plus periodic-cleanup pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use pml_core::ids::WorkflowId;
use pml_core::workflow::PendingEntry;

use crate::error::{WorkflowError, WorkflowResult};

/// How often the background sweep scans for expired entries (§4.5: "on a
/// coarse schedule, e.g. once per minute").
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local store of suspended workflows awaiting a human-in-the-loop
/// resume. Restarting the gateway loses all pending state by design (§4.5);
/// the host is expected to re-initiate any workflow it cares about.
#[derive(Debug, Default)]
pub struct PendingWorkflowStore {
    entries: RwLock<HashMap<WorkflowId, PendingEntry>>,
}

impl PendingWorkflowStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Insert or replace the entry for `id`, refreshing its TTL clock
    /// (`created_at` is taken from `entry` as supplied by the caller).
    pub async fn set_with_id(&self, id: WorkflowId, entry: PendingEntry) {
        self.entries.write().await.insert(id, entry);
    }

    /// Return the entry for `id` if present and not expired.
    ///
    /// An expired entry is treated as absent even if the sweep has not
    /// yet removed it — `get` never returns stale state.
    pub async fn get(&self, id: WorkflowId) -> Option<PendingEntry> {
        let entries = self.entries.read().await;
        let entry = entries.get(&id)?;
        if entry.is_expired_at(Utc::now()) {
            None
        } else {
            Some(entry.clone())
        }
    }

    /// Return the entry for `id`, or [`WorkflowError::UnknownWorkflow`] if
    /// absent or expired — the shape the RESUME path needs (§4.3).
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::UnknownWorkflow`] if no live entry exists.
    pub async fn get_or_unknown(&self, id: WorkflowId) -> WorkflowResult<PendingEntry> {
        self.get(id).await.ok_or(WorkflowError::UnknownWorkflow)
    }

    /// Remove the entry for `id`. Idempotent — removing a missing id is
    /// not an error.
    pub async fn delete(&self, id: WorkflowId) {
        self.entries.write().await.remove(&id);
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove every expired entry. Returns the number removed.
    pub async fn sweep_once(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(entries.len())
    }
}

/// Spawn the background sweep task. Runs until the returned handle is
/// aborted or dropped — callers typically keep it alongside the store
/// for the gateway process's lifetime.
pub fn spawn_sweep(store: Arc<PendingWorkflowStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = store.sweep_once().await;
            if removed > 0 {
                info!(removed, "swept expired pending workflow entries");
            } else {
                debug!("pending workflow sweep found nothing expired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::ids::ToolId;
    use pml_core::workflow::ApprovalKind;
    use std::collections::HashMap as StdHashMap;

    fn sample_entry(ttl: Duration, created_at: chrono::DateTime<Utc>) -> PendingEntry {
        PendingEntry {
            workflow_id: WorkflowId::new(),
            code: "return 1;".to_string(),
            originating_tool: ToolId::new("pay", "charge"),
            approval_kind: ApprovalKind::ToolPermission,
            payload: serde_json::json!({}),
            tool_fqdn_map: StdHashMap::new(),
            dag_tasks: Vec::new(),
            created_at,
            ttl,
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = PendingWorkflowStore::new();
        let id = WorkflowId::new();
        let entry = sample_entry(Duration::from_secs(900), Utc::now());
        store.set_with_id(id, entry.clone()).await;
        let fetched = store.get(id).await.expect("entry should be present");
        assert_eq!(fetched.code, entry.code);
    }

    #[tokio::test]
    async fn get_treats_expired_entry_as_absent() {
        let store = PendingWorkflowStore::new();
        let id = WorkflowId::new();
        let created_at = Utc::now() - chrono::Duration::minutes(20);
        store.set_with_id(id, sample_entry(Duration::from_secs(900), created_at)).await;
        assert!(store.get(id).await.is_none());
        assert_eq!(store.len().await, 1, "sweep has not run yet, raw entry still held");
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let store = PendingWorkflowStore::new();
        let live = WorkflowId::new();
        let dead = WorkflowId::new();
        store.set_with_id(live, sample_entry(Duration::from_secs(900), Utc::now())).await;
        store
            .set_with_id(dead, sample_entry(Duration::from_secs(900), Utc::now() - chrono::Duration::minutes(20)))
            .await;

        let removed = store.sweep_once().await;
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(live).await.is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = PendingWorkflowStore::new();
        let id = WorkflowId::new();
        store.delete(id).await;
        store.set_with_id(id, sample_entry(Duration::from_secs(900), Utc::now())).await;
        store.delete(id).await;
        store.delete(id).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn get_or_unknown_surfaces_typed_error() {
        let store = PendingWorkflowStore::new();
        let result = store.get_or_unknown(WorkflowId::new()).await;
        assert!(matches!(result, Err(WorkflowError::UnknownWorkflow)));
    }
}
