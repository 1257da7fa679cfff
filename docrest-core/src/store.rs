//! Main document store interface.
//!
//! - [`DocumentStore`] - Store bound to a concrete backend type
//! - [`DynDocumentStore`] - Store over a backend picked at runtime
//!
//! # Example
//!
//! ```ignore
//! use docrest_core::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend).into_dyn();
//! let movies = store.typed_collection::<Movie>();
//! let todos = store.collection("todos");
//! ```

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::debug;

use crate::{
    attachment::{Attachment, AttachmentUpload},
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store whose engine was picked at runtime.
pub type DynDocumentStore = DocumentStore<Arc<dyn StoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Direct access to the binary-object area.
    pub fn attachments(&self) -> Attachments<'_, B> {
        Attachments { backend: &self.backend }
    }

    /// Releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to shut down cleanly.
    pub async fn shutdown(&self) -> DocumentStoreResult<()> {
        debug!("shutting down document store");

        self.backend.shutdown().await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        DocumentStore {
            backend: Arc::new(self.backend),
        }
    }
}

/// Attachment operations that do not go through a parent record.
#[derive(Debug)]
pub struct Attachments<'a, B: StoreBackend> {
    backend: &'a B,
}

impl<B: StoreBackend> Attachments<'_, B> {
    pub async fn put(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId> {
        self.backend.put_attachment(upload).await
    }

    pub async fn get(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>> {
        self.backend.get_attachment(id).await
    }

    /// The latest file saved under `filename`.
    pub async fn get_by_name(&self, filename: &str) -> DocumentStoreResult<Attachment> {
        self.backend
            .find_attachment_by_name(filename)
            .await?
            .ok_or_else(|| DocumentStoreError::AttachmentNotFound(filename.to_string()))
    }

    pub async fn delete(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        self.backend.delete_attachment(id).await
    }
}
