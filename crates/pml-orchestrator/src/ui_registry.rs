//! Process-local storage for composite UI documents (§4.9): the
//! generator is pure, but something has to hold the rendered HTML
//! between the moment `execute` builds it and the moment the gateway's
//! `GET /ui/<path>` route serves it back to an iframe.

use dashmap::DashMap;

/// Maps a `ui://pml/workflow/<id>` resource uri to its rendered HTML
/// document. Entries are never evicted here — the pending-workflow
/// store's TTL bounds how long a workflow can still reference one, but
/// a finished workflow's composite document stays servable for the
/// lifetime of the process, same as any other registered MCP resource.
#[derive(Debug, Default)]
pub struct UiRegistry {
    documents: DashMap<String, String>,
}

impl UiRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `html` under `resource_uri`, replacing any prior document.
    pub fn register(&self, resource_uri: String, html: String) {
        self.documents.insert(resource_uri, html);
    }

    /// Fetch a previously-registered document, if any.
    #[must_use]
    pub fn get(&self, resource_uri: &str) -> Option<String> {
        self.documents.get(resource_uri).map(|entry| entry.value().clone())
    }
}
