use std::sync::Arc;

use docrest_core::store::{DocumentStore, DynDocumentStore};
use docrest_memory::InMemoryStore;

/// Shared handler state: the store handle created at startup.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<DynDocumentStore>,
}

impl AppState {
    pub fn new(store: Arc<DynDocumentStore>) -> Self {
        Self { store }
    }

    /// State over a fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(DocumentStore::new(InMemoryStore::new()).into_dyn()))
    }
}
