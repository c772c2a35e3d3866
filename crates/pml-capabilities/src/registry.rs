//! The capability registry (§4.6): name resolution, atomic rename with
//! alias chain-flattening, usage recording, and reliability-weighted
//! search delegation.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use pml_core::alias::Alias;
use pml_core::capability::CapabilityRecord;
use pml_core::final_score;
use pml_core::ids::CapabilityFqdn;

use crate::error::{CapabilitiesError, CapabilitiesResult};
use crate::search::{CapabilitySearch, RankedCandidate};
use crate::store::{AliasStore, RecordStore};

/// The scope a name resolution or rename is performed within.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Organization.
    pub org: String,
    /// Project.
    pub project: String,
}

/// Owns the record/alias stores and the search collaborator, and
/// implements the registry operations from §4.6.
///
/// `rename` serializes against itself with an internal mutex so steps
/// 1–5 appear atomic to concurrent callers, mirroring the "database
/// transaction" requirement without needing the store itself to expose
/// multi-statement transactions.
pub struct CapabilityRegistry {
    records: Arc<dyn RecordStore>,
    aliases: Arc<dyn AliasStore>,
    search: Arc<dyn CapabilitySearch>,
    rename_lock: Mutex<()>,
}

impl CapabilityRegistry {
    /// Build a registry over the given stores and search collaborator.
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        aliases: Arc<dyn AliasStore>,
        search: Arc<dyn CapabilitySearch>,
    ) -> Self {
        Self {
            records,
            aliases,
            search,
            rename_lock: Mutex::new(()),
        }
    }

    /// Insert a brand-new capability record.
    ///
    /// # Errors
    ///
    /// Propagates the backing store's error.
    pub async fn register(&self, record: CapabilityRecord) -> CapabilitiesResult<()> {
        self.records.put(record).await
    }

    /// `resolveByName(name, scope)` (§4.6): exact match, then alias, then
    /// public fallback, in that order; absent if none apply.
    ///
    /// # Errors
    ///
    /// Propagates the backing store's error.
    pub async fn resolve_by_name(
        &self,
        name: &str,
        scope: &Scope,
    ) -> CapabilitiesResult<Option<CapabilityRecord>> {
        if let Some(record) = self
            .records
            .find_by_display_name(&scope.org, &scope.project, name)
            .await?
        {
            return Ok(Some(record));
        }

        if let Some(alias) = self.aliases.get(&scope.org, &scope.project, name).await? {
            warn!(
                alias = name,
                target = %alias.target_fqdn,
                "resolved capability via deprecated alias"
            );
            return self.records.get(&alias.target_fqdn).await;
        }

        self.records.find_public_by_display_name(name).await
    }

    /// `rename(oldFqdn, newDisplayName)` (§4.6): the 5-step atomic
    /// procedure, including alias chain-flattening.
    ///
    /// `new_namespace`/`new_action` let the caller change the FQDN's
    /// namespace/action segments along with the display name; pass the
    /// record's existing values to rename the display name alone.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::RenameSourceMissing`] if `old_fqdn`
    /// does not exist, or propagates the backing store's error.
    pub async fn rename(
        &self,
        old_fqdn: &CapabilityFqdn,
        new_namespace: &str,
        new_action: &str,
        new_display_name: &str,
    ) -> CapabilitiesResult<CapabilityRecord> {
        let _guard = self.rename_lock.lock().await;

        // Step 1: load old record.
        let old_record = self
            .records
            .get(old_fqdn)
            .await?
            .ok_or_else(|| CapabilitiesError::RenameSourceMissing(old_fqdn.as_str().to_string()))?;

        // Step 2: create new record, version incremented, same short hash.
        let new_record = old_record.renamed(new_namespace, new_action, new_display_name);
        self.records.put(new_record.clone()).await?;

        // Step 3: alias the old display name to the new fqdn.
        let old_alias = Alias::new(
            old_record.org.clone(),
            old_record.project.clone(),
            old_record.display_name.clone(),
            new_record.fqdn().clone(),
        );
        self.aliases.put(old_alias).await?;

        // Step 4: flatten — rewrite every alias that targeted the old fqdn.
        let stale = self.aliases.find_by_target(old_fqdn).await?;
        for mut alias in stale {
            alias.retarget(new_record.fqdn().clone());
            self.aliases.put(alias).await?;
        }

        // Step 5: delete the old record.
        self.records.delete(old_fqdn).await?;

        Ok(new_record)
    }

    /// `recordUsage(fqdn, success, latencyMs)` (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::NotFound`] if no record exists for
    /// `fqdn`, or propagates the backing store's error.
    pub async fn record_usage(
        &self,
        fqdn: &CapabilityFqdn,
        success: bool,
        latency_ms: u64,
    ) -> CapabilitiesResult<()> {
        let mut record = self
            .records
            .get(fqdn)
            .await?
            .ok_or_else(|| CapabilitiesError::NotFound(fqdn.as_str().to_string()))?;
        record.record_usage(success, latency_ms);
        self.records.put(record).await
    }

    /// Search by intent (§4.6, §4.8): delegate to the external search
    /// collaborator, then apply the reliability multiplier to each
    /// candidate's current `successRate`, returning hits ranked by
    /// `final_score` descending.
    ///
    /// # Errors
    ///
    /// Propagates the backing store's error while loading candidate
    /// records for their success rates.
    pub async fn search_by_intent(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
    ) -> CapabilitiesResult<Vec<RankedCandidate>> {
        let hits = self.search.search(query, &scope.org, &scope.project, limit).await;
        let mut ranked = Vec::with_capacity(hits.len());
        for hit in hits {
            let success_rate = self
                .records
                .get(&hit.fqdn)
                .await?
                .map_or(0.0, |record| record.success_rate());
            ranked.push(RankedCandidate {
                fqdn: hit.fqdn,
                final_score: final_score(hit.semantic_score, success_rate),
            });
        }
        ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{NullCapabilitySearch, SemanticHit};
    use crate::store::InMemoryCapabilityStore;
    use async_trait::async_trait;
    use pml_core::tool::Routing;

    fn registry() -> (CapabilityRegistry, Arc<InMemoryCapabilityStore>) {
        let store = Arc::new(InMemoryCapabilityStore::new());
        let registry = CapabilityRegistry::new(
            store.clone(),
            store.clone(),
            Arc::new(NullCapabilitySearch),
        );
        (registry, store)
    }

    fn sample() -> CapabilityRecord {
        CapabilityRecord::new(
            "alice",
            "default",
            "fs",
            "read",
            "Read File",
            b"return 1;",
            Routing::Client,
            serde_json::json!({"type": "object"}),
        )
    }

    #[tokio::test]
    async fn resolve_by_name_finds_exact_match() {
        let (registry, _store) = registry();
        registry.register(sample()).await.unwrap();
        let scope = Scope { org: "alice".to_string(), project: "default".to_string() };
        let found = registry.resolve_by_name("Read File", &scope).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn resolve_by_name_falls_back_to_public() {
        let (registry, _store) = registry();
        let mut record = sample();
        record.visibility = pml_core::Visibility::Public;
        registry.register(record).await.unwrap();
        let scope = Scope { org: "bob".to_string(), project: "other".to_string() };
        let found = registry.resolve_by_name("Read File", &scope).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn resolve_by_name_absent_when_nothing_matches() {
        let (registry, _store) = registry();
        let scope = Scope { org: "alice".to_string(), project: "default".to_string() };
        let found = registry.resolve_by_name("Nope", &scope).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn rename_creates_alias_and_flattens_chain() {
        let (registry, store) = registry();
        let original = sample();
        let original_fqdn = original.fqdn().clone();
        registry.register(original).await.unwrap();

        // A pre-existing alias that already points at the original fqdn,
        // simulating an earlier rename.
        store
            .put(Alias::new("alice", "default", "very-old-name", original_fqdn.clone()))
            .await
            .unwrap();

        let renamed = registry
            .rename(&original_fqdn, "fs", "read_v2", "Read File v2")
            .await
            .unwrap();

        assert_eq!(renamed.version, 2);
        assert!(store.get(&original_fqdn).await.unwrap().is_none(), "old record deleted");

        let new_alias = store.get("alice", "default", "Read File").await.unwrap();
        assert_eq!(new_alias.unwrap().target_fqdn, *renamed.fqdn());

        let flattened = store.get("alice", "default", "very-old-name").await.unwrap();
        assert_eq!(
            flattened.unwrap().target_fqdn,
            *renamed.fqdn(),
            "stale alias must be rewritten to the new fqdn, not the old one"
        );
    }

    #[tokio::test]
    async fn rename_missing_source_is_an_error() {
        let (registry, _store) = registry();
        let missing = CapabilityFqdn::parse("alice.default.fs.read.dead0").unwrap();
        let result = registry.rename(&missing, "fs", "read", "x").await;
        assert!(matches!(result, Err(CapabilitiesError::RenameSourceMissing(_))));
    }

    #[tokio::test]
    async fn record_usage_updates_success_rate() {
        let (registry, _store) = registry();
        let record = sample();
        let fqdn = record.fqdn().clone();
        registry.register(record).await.unwrap();
        registry.record_usage(&fqdn, true, 10).await.unwrap();
        registry.record_usage(&fqdn, false, 20).await.unwrap();
        let updated = registry.resolve_by_name(
            "Read File",
            &Scope { org: "alice".to_string(), project: "default".to_string() },
        ).await.unwrap().unwrap();
        assert_eq!(updated.usage_count, 2);
        assert_eq!(updated.success_count, 1);
    }

    struct StubSearch;

    #[async_trait]
    impl CapabilitySearch for StubSearch {
        async fn search(&self, _query: &str, _org: &str, _project: &str, _limit: usize) -> Vec<SemanticHit> {
            vec![SemanticHit {
                fqdn: CapabilityFqdn::parse("alice.default.fs.read.aabb").unwrap(),
                semantic_score: 0.8,
            }]
        }
    }

    #[tokio::test]
    async fn search_by_intent_applies_reliability_multiplier() {
        let store = Arc::new(InMemoryCapabilityStore::new());
        let registry = CapabilityRegistry::new(store.clone(), store.clone(), Arc::new(StubSearch));
        let mut record = CapabilityRecord::new(
            "alice", "default", "fs", "read", "Read File", b"return 1;",
            Routing::Client, serde_json::json!({}),
        );
        // Force the fqdn to match StubSearch's hit by reusing the same code bytes.
        for _ in 0..10 {
            record.record_usage(true, 1);
        }
        registry.register(record).await.unwrap();

        let scope = Scope { org: "alice".to_string(), project: "default".to_string() };
        let ranked = registry.search_by_intent("read a file", &scope, 5).await.unwrap();
        assert_eq!(ranked.len(), 1);
        // success_rate 1.0 > 0.9 -> reliability 1.2, capped at 0.95.
        assert!((ranked[0].final_score - 0.95).abs() < f64::EPSILON);
    }
}
