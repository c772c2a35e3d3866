//! Capability and alias storage (§4.6), grounded on
//! `astrid-capabilities::store::CapabilityStore`'s in-memory/persistent
//! split — an in-memory store for tests and single-session use, and a
//! `surrealdb`-embedded store (the teacher's own persistence dependency)
//! for anything surviving a restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, SurrealKv};

use pml_core::alias::Alias;
use pml_core::capability::CapabilityRecord;
use pml_core::ids::CapabilityFqdn;

use crate::error::{CapabilitiesError, CapabilitiesResult};

const NS: &str = "pml";
const DB: &str = "capabilities";
const TABLE_RECORDS: &str = "capability";
const TABLE_ALIASES: &str = "alias";

/// Persistence boundary for capability records (§4.6).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record for `fqdn`, if any.
    async fn get(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<Option<CapabilityRecord>>;

    /// Insert or overwrite the record for its own fqdn.
    async fn put(&self, record: CapabilityRecord) -> CapabilitiesResult<()>;

    /// Remove the record for `fqdn`. Idempotent.
    async fn delete(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<()>;

    /// §4.6 resolution step 1: exact `(org, project, display_name)` match.
    async fn find_by_display_name(
        &self,
        org: &str,
        project: &str,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>>;

    /// §4.6 resolution step 3: first public record with this display name.
    async fn find_public_by_display_name(
        &self,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>>;
}

/// Persistence boundary for aliases (§3 Alias, §4.6 rename).
#[async_trait]
pub trait AliasStore: Send + Sync {
    /// Fetch the alias keyed by `(org, project, alias)`.
    async fn get(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<Option<Alias>>;

    /// Insert or overwrite an alias at its own key.
    async fn put(&self, alias: Alias) -> CapabilitiesResult<()>;

    /// Every alias currently targeting `target` — used by rename's
    /// chain-flattening step (§4.6 step 4).
    async fn find_by_target(&self, target: &CapabilityFqdn) -> CapabilitiesResult<Vec<Alias>>;

    /// Remove the alias at `(org, project, alias)`. Idempotent.
    async fn delete(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<()>;
}

/// An in-memory [`RecordStore`] and [`AliasStore`], cleared on restart.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityStore {
    records: RwLock<HashMap<String, CapabilityRecord>>,
    aliases: RwLock<HashMap<(String, String, String), Alias>>,
}

impl InMemoryCapabilityStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryCapabilityStore {
    async fn get(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<Option<CapabilityRecord>> {
        let records = self.records.read().map_err(poison)?;
        Ok(records.get(fqdn.as_str()).cloned())
    }

    async fn put(&self, record: CapabilityRecord) -> CapabilitiesResult<()> {
        let mut records = self.records.write().map_err(poison)?;
        records.insert(record.fqdn().as_str().to_string(), record);
        Ok(())
    }

    async fn delete(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<()> {
        let mut records = self.records.write().map_err(poison)?;
        records.remove(fqdn.as_str());
        Ok(())
    }

    async fn find_by_display_name(
        &self,
        org: &str,
        project: &str,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>> {
        let records = self.records.read().map_err(poison)?;
        Ok(records
            .values()
            .find(|r| r.org == org && r.project == project && r.display_name == display_name)
            .cloned())
    }

    async fn find_public_by_display_name(
        &self,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>> {
        let records = self.records.read().map_err(poison)?;
        Ok(records
            .values()
            .find(|r| r.display_name == display_name && r.visibility == pml_core::Visibility::Public)
            .cloned())
    }
}

#[async_trait]
impl AliasStore for InMemoryCapabilityStore {
    async fn get(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<Option<Alias>> {
        let aliases = self.aliases.read().map_err(poison)?;
        Ok(aliases
            .get(&(org.to_string(), project.to_string(), alias.to_string()))
            .cloned())
    }

    async fn put(&self, alias: Alias) -> CapabilitiesResult<()> {
        let mut aliases = self.aliases.write().map_err(poison)?;
        aliases.insert(alias.key(), alias);
        Ok(())
    }

    async fn find_by_target(&self, target: &CapabilityFqdn) -> CapabilitiesResult<Vec<Alias>> {
        let aliases = self.aliases.read().map_err(poison)?;
        Ok(aliases
            .values()
            .filter(|a| &a.target_fqdn == target)
            .cloned()
            .collect())
    }

    async fn delete(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<()> {
        let mut aliases = self.aliases.write().map_err(poison)?;
        aliases.remove(&(org.to_string(), project.to_string(), alias.to_string()));
        Ok(())
    }
}

fn poison<T>(_: std::sync::PoisonError<T>) -> CapabilitiesError {
    CapabilitiesError::Storage("in-memory capability store lock poisoned".to_string())
}

/// A `surrealdb`-embedded [`RecordStore`] and [`AliasStore`] (§4.6's
/// persisted store, the teacher's own persistence dependency rather
/// than an introduced one).
pub struct SurrealCapabilityStore {
    db: Surreal<Db>,
}

impl SurrealCapabilityStore {
    /// Open an in-memory `surrealdb` engine — useful for tests and
    /// single-process deployments that accept losing state on restart.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::Storage`] if the engine fails to start.
    pub async fn in_memory() -> CapabilitiesResult<Self> {
        let db = Surreal::new::<Mem>(()).await.map_err(surreal_err)?;
        db.use_ns(NS).use_db(DB).await.map_err(surreal_err)?;
        Ok(Self { db })
    }

    /// Open a disk-backed `SurrealKV` engine rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::Storage`] if the engine fails to open.
    pub async fn open(path: impl AsRef<Path>) -> CapabilitiesResult<Self> {
        let db = Surreal::new::<SurrealKv>(path.as_ref()).await.map_err(surreal_err)?;
        db.use_ns(NS).use_db(DB).await.map_err(surreal_err)?;
        Ok(Self { db })
    }
}

fn surreal_err(e: surrealdb::Error) -> CapabilitiesError {
    CapabilitiesError::Storage(e.to_string())
}

#[async_trait]
impl RecordStore for SurrealCapabilityStore {
    async fn get(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<Option<CapabilityRecord>> {
        self.db
            .select((TABLE_RECORDS, fqdn.as_str()))
            .await
            .map_err(surreal_err)
    }

    async fn put(&self, record: CapabilityRecord) -> CapabilitiesResult<()> {
        let key = record.fqdn().as_str().to_string();
        let _: Option<CapabilityRecord> = self
            .db
            .upsert((TABLE_RECORDS, key))
            .content(record)
            .await
            .map_err(surreal_err)?;
        Ok(())
    }

    async fn delete(&self, fqdn: &CapabilityFqdn) -> CapabilitiesResult<()> {
        let _: Option<CapabilityRecord> = self
            .db
            .delete((TABLE_RECORDS, fqdn.as_str()))
            .await
            .map_err(surreal_err)?;
        Ok(())
    }

    async fn find_by_display_name(
        &self,
        org: &str,
        project: &str,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM type::table($table) WHERE org = $org AND project = $project AND display_name = $name LIMIT 1")
            .bind(("table", TABLE_RECORDS))
            .bind(("org", org.to_string()))
            .bind(("project", project.to_string()))
            .bind(("name", display_name.to_string()))
            .await
            .map_err(surreal_err)?;
        let records: Vec<CapabilityRecord> = response.take(0).map_err(surreal_err)?;
        Ok(records.into_iter().next())
    }

    async fn find_public_by_display_name(
        &self,
        display_name: &str,
    ) -> CapabilitiesResult<Option<CapabilityRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM type::table($table) WHERE display_name = $name AND visibility = 'public' LIMIT 1")
            .bind(("table", TABLE_RECORDS))
            .bind(("name", display_name.to_string()))
            .await
            .map_err(surreal_err)?;
        let records: Vec<CapabilityRecord> = response.take(0).map_err(surreal_err)?;
        Ok(records.into_iter().next())
    }
}

#[async_trait]
impl AliasStore for SurrealCapabilityStore {
    async fn get(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<Option<Alias>> {
        let key = alias_key(org, project, alias);
        self.db.select((TABLE_ALIASES, key)).await.map_err(surreal_err)
    }

    async fn put(&self, alias: Alias) -> CapabilitiesResult<()> {
        let key = alias_key(&alias.org, &alias.project, &alias.alias);
        let _: Option<Alias> = self
            .db
            .upsert((TABLE_ALIASES, key))
            .content(alias)
            .await
            .map_err(surreal_err)?;
        Ok(())
    }

    async fn find_by_target(&self, target: &CapabilityFqdn) -> CapabilitiesResult<Vec<Alias>> {
        let mut response = self
            .db
            .query("SELECT * FROM type::table($table) WHERE target_fqdn = $target")
            .bind(("table", TABLE_ALIASES))
            .bind(("target", target.as_str().to_string()))
            .await
            .map_err(surreal_err)?;
        response.take(0).map_err(surreal_err)
    }

    async fn delete(&self, org: &str, project: &str, alias: &str) -> CapabilitiesResult<()> {
        let key = alias_key(org, project, alias);
        let _: Option<Alias> = self.db.delete((TABLE_ALIASES, key)).await.map_err(surreal_err)?;
        Ok(())
    }
}

fn alias_key(org: &str, project: &str, alias: &str) -> String {
    format!("{org}:{project}:{alias}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pml_core::tool::Routing;

    fn sample(namespace: &str, action: &str) -> CapabilityRecord {
        CapabilityRecord::new(
            "alice",
            "default",
            namespace,
            action,
            "Read File",
            b"return 1;",
            Routing::Client,
            serde_json::json!({"type": "object"}),
        )
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_a_record() {
        let store = InMemoryCapabilityStore::new();
        let record = sample("fs", "read");
        let fqdn = record.fqdn().clone();
        store.put(record).await.unwrap();
        let fetched = store.get(&fqdn).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn in_memory_store_finds_by_display_name() {
        let store = InMemoryCapabilityStore::new();
        store.put(sample("fs", "read")).await.unwrap();
        let found = store
            .find_by_display_name("alice", "default", "Read File")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(store
            .find_by_display_name("bob", "default", "Read File")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn in_memory_alias_store_tracks_targets() {
        let store = InMemoryCapabilityStore::new();
        let target = CapabilityFqdn::parse("alice.default.fs.read.aabb").unwrap();
        store
            .put(Alias::new("alice", "default", "read-file", target.clone()))
            .await
            .unwrap();
        let found = store.get("alice", "default", "read-file").await.unwrap();
        assert!(found.is_some());
        let by_target = store.find_by_target(&target).await.unwrap();
        assert_eq!(by_target.len(), 1);
    }

    #[tokio::test]
    async fn surreal_in_memory_store_round_trips_a_record() {
        let store = SurrealCapabilityStore::in_memory().await.unwrap();
        let record = sample("fs", "write");
        let fqdn = record.fqdn().clone();
        store.put(record).await.unwrap();
        let fetched = store.get(&fqdn).await.unwrap();
        assert!(fetched.is_some());
    }
}
