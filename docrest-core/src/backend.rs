//! Storage backend abstraction.
//!
//! A [`StoreBackend`] exposes the primitives of an external document store: collection-level
//! find, insert, update, replace and delete, plus a separate binary-object area for attachments.
//! Collections ([`crate::collection`]) compose these primitives into the service's operations.
//!
//! The trait is object safe so that the engine can be picked at runtime; `Arc<B>` forwards to
//! `B`, which lets a [`crate::store::DynDocumentStore`] hold an `Arc<dyn StoreBackend>`.
//!
//! ```ignore
//! use docrest_core::{backend::StoreBackend, document::{Record, RecordId}};
//! use bson::doc;
//!
//! let record = Record::new(RecordId::Int(1), doc! { "title": "todo title" });
//! let outcome = backend.insert_documents(vec![record], true, "todos").await?;
//! assert_eq!(outcome.inserted, vec![0]);
//! ```

use async_trait::async_trait;
use bson::{Document as BsonDocument, oid::ObjectId};
use std::{fmt::Debug, sync::Arc};

use crate::{
    attachment::{Attachment, AttachmentUpload},
    bulk::InsertOutcome,
    document::{Record, RecordId},
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// Outcome of a replace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplaceOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Set when no record matched and the replacement was inserted.
    pub upserted: Option<RecordId>,
}

/// Abstract interface for document store engines.
///
/// # Thread Safety
///
/// Implementations are shared by every request handler and must tolerate concurrent calls.
///
/// # Errors
///
/// A store that cannot be reached reports
/// [`StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable). Errors are never
/// retried at this level.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts records in input order.
    ///
    /// A record whose key already exists is never overwritten: it is reported in
    /// [`InsertOutcome::duplicates`]. With `ordered` set the insert stops at the first
    /// duplicate; otherwise every other record is still inserted.
    async fn insert_documents(
        &self,
        records: Vec<Record>,
        ordered: bool,
        collection: &str,
    ) -> DocumentStoreResult<InsertOutcome>;

    /// Merges `patch` into every record whose key is in `ids`, top-level fields only.
    ///
    /// Returns the number of records that matched.
    async fn update_documents(
        &self,
        ids: Vec<RecordId>,
        patch: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Replaces the fields of the record with key `id`.
    ///
    /// With `upsert` set and no match, `fields` is inserted under `id`.
    async fn replace_document(
        &self,
        id: RecordId,
        fields: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<ReplaceOutcome>;

    /// Deletes records by key and returns how many were removed. Unknown keys are skipped.
    async fn delete_documents(&self, ids: Vec<RecordId>, collection: &str) -> DocumentStoreResult<u64>;

    /// Retrieves records by key. Unknown keys are omitted from the result.
    async fn get_documents(
        &self,
        ids: Vec<RecordId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>>;

    /// Runs a query. Results come back in the store's natural order.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>>;

    /// Counts the records matching `filter` (all records without one).
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;

    /// Saves an attachment in the binary-object area and returns its reference.
    async fn put_attachment(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId>;

    /// Reads an attachment back, or `None` when the reference is unknown.
    async fn get_attachment(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>>;

    /// Reads back the most recent attachment saved under `filename`, or `None` when there is
    /// none.
    async fn find_attachment_by_name(&self, filename: &str) -> DocumentStoreResult<Option<Attachment>>;

    /// Deletes an attachment. Returns `false` when the reference was unknown.
    async fn delete_attachment(&self, id: ObjectId) -> DocumentStoreResult<bool>;

    /// Releases connections. The default implementation does nothing.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_documents(
        &self,
        records: Vec<Record>,
        ordered: bool,
        collection: &str,
    ) -> DocumentStoreResult<InsertOutcome> {
        (**self)
            .insert_documents(records, ordered, collection)
            .await
    }

    async fn update_documents(
        &self,
        ids: Vec<RecordId>,
        patch: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        (**self)
            .update_documents(ids, patch, collection)
            .await
    }

    async fn replace_document(
        &self,
        id: RecordId,
        fields: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<ReplaceOutcome> {
        (**self)
            .replace_document(id, fields, upsert, collection)
            .await
    }

    async fn delete_documents(&self, ids: Vec<RecordId>, collection: &str) -> DocumentStoreResult<u64> {
        (**self)
            .delete_documents(ids, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<RecordId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        (**self)
            .get_documents(ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        (**self)
            .query_documents(query, collection)
            .await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        (**self)
            .count_documents(filter, collection)
            .await
    }

    async fn put_attachment(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId> {
        (**self).put_attachment(upload).await
    }

    async fn get_attachment(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>> {
        (**self).get_attachment(id).await
    }

    async fn find_attachment_by_name(&self, filename: &str) -> DocumentStoreResult<Option<Attachment>> {
        (**self).find_attachment_by_name(filename).await
    }

    async fn delete_attachment(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        (**self).delete_attachment(id).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        (**self).shutdown().await
    }
}

/// Factory for backends, so that connection setup can be async and fallible.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
