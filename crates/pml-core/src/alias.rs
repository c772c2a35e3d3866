//! Capability alias records (§3 Alias, §4.6 rename chain-flattening).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CapabilityFqdn;

/// `(org, project, alias) -> targetFqdn`, with `(org, project, alias)` as
/// the unique primary key.
///
/// Alias chains are kept flat by construction: nothing in this crate
/// offers a way to resolve an alias's target through another alias.
/// `pml-capabilities::rename` is responsible for rewriting every alias
/// that targeted the old fqdn so that none ever points through another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    /// Owning organization.
    pub org: String,
    /// Owning project.
    pub project: String,
    /// The alias name itself.
    pub alias: String,
    /// The capability fqdn this alias currently resolves to.
    pub target_fqdn: CapabilityFqdn,
    /// When this alias was created (or last rewritten).
    pub created_at: DateTime<Utc>,
}

impl Alias {
    /// Construct a fresh alias pointing at `target_fqdn`.
    #[must_use]
    pub fn new(
        org: impl Into<String>,
        project: impl Into<String>,
        alias: impl Into<String>,
        target_fqdn: CapabilityFqdn,
    ) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
            alias: alias.into(),
            target_fqdn,
            created_at: Utc::now(),
        }
    }

    /// The `(org, project, alias)` primary key.
    #[must_use]
    pub fn key(&self) -> (String, String, String) {
        (self.org.clone(), self.project.clone(), self.alias.clone())
    }

    /// Rewrite this alias's target in place, as done by the rename
    /// chain-flattening step (§4.6 step 4).
    pub fn retarget(&mut self, new_target: CapabilityFqdn) {
        self.target_fqdn = new_target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retarget_changes_only_the_target() {
        let original = CapabilityFqdn::parse("a.b.c.v1.aabb").unwrap();
        let mut alias = Alias::new("a", "b", "v1old", original);
        let new_target = CapabilityFqdn::parse("a.b.c.v2.aabb").unwrap();
        alias.retarget(new_target.clone());
        assert_eq!(alias.target_fqdn, new_target);
        assert_eq!(alias.key(), ("a".to_string(), "b".to_string(), "v1old".to_string()));
    }
}
