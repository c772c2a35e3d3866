//! PML Capabilities - the capability registry (§4.6).
//!
//! Manages named, versioned, content-addressed capability records with
//! scoped resolution and alias-based renaming. Vector/semantic search
//! is treated as an external collaborator; this crate applies the
//! reliability multiplier (§4.8) at the retrieval boundary regardless
//! of which search backend answers.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod registry;
pub mod search;
pub mod store;

pub use error::{CapabilitiesError, CapabilitiesResult};
pub use registry::{CapabilityRegistry, Scope};
pub use search::{CapabilitySearch, NullCapabilitySearch, RankedCandidate, SemanticHit};
pub use store::{AliasStore, InMemoryCapabilityStore, RecordStore, SurrealCapabilityStore};
