//! The vector/semantic search collaborator (§4.6 "Search by intent").
//!
//! The registry does not embed text or run vector search itself — both
//! are treated as opaque external collaborators (spec §1 "Out of
//! scope"). This module only defines the interface the registry calls
//! through and applies the reliability multiplier (§4.8) at the
//! boundary, regardless of which search backend answers.

use async_trait::async_trait;

use pml_core::ids::CapabilityFqdn;

/// One semantic-search hit before reliability weighting is applied.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    /// The candidate capability.
    pub fqdn: CapabilityFqdn,
    /// The embedding similarity score, unweighted.
    pub semantic_score: f64,
}

/// A ranked candidate after the reliability multiplier has been applied
/// (§4.6, §4.8): `finalScore = semanticScore × reliability`, capped.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    /// The candidate capability.
    pub fqdn: CapabilityFqdn,
    /// `semantic_score * reliability_multiplier(success_rate)`, capped.
    pub final_score: f64,
}

/// External vector/semantic search over capability descriptions.
///
/// Implemented outside this crate — the embedding model and index are
/// genuinely external collaborators, not something the gateway owns.
#[async_trait]
pub trait CapabilitySearch: Send + Sync {
    /// Return semantic hits for `query`, unweighted by reliability.
    async fn search(&self, query: &str, org: &str, project: &str, limit: usize) -> Vec<SemanticHit>;
}

/// A [`CapabilitySearch`] that never finds anything — useful when no
/// search backend is configured, or in tests that only exercise exact
/// name resolution.
#[derive(Debug, Default)]
pub struct NullCapabilitySearch;

#[async_trait]
impl CapabilitySearch for NullCapabilitySearch {
    async fn search(&self, _query: &str, _org: &str, _project: &str, _limit: usize) -> Vec<SemanticHit> {
        Vec::new()
    }
}
