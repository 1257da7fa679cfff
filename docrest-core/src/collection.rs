//! Collections: the operations of the document access layer.
//!
//! A [`Collection`] works on untyped [`Record`]s (dynamic field maps). A [`TypedCollection`]
//! works on a [`Document`] type and adds schema validation: inputs and patched results must
//! deserialize into the type.
//!
//! # Identity snapshots
//!
//! `update_many` and `delete_many` first read the keys of the records that match the filter,
//! then mutate exactly those keys and return them. A patch that changes the filtered field
//! therefore still reports every record it touched. The read and the write are two store calls:
//! a record inserted between them is not touched, and one deleted between them is still
//! reported.
//!
//! The `find_one_and_*` operations work the same way: they read the record, write it, and
//! return the record as it was read.
//!
//! # Example
//!
//! ```ignore
//! let todos = store.collection("todos");
//! let report = todos
//!     .insert_many(vec![doc! { "_id": 1, "title": "one" }, doc! { "_id": 1, "title": "again" }], BulkMode::ContinueOnDuplicate)
//!     .await?;
//! assert_eq!(report.duplicates.len(), 1);
//! ```

use bson::{Bson, Document as BsonDocument};
use serde::Serialize;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    attachment::{Attachment, AttachmentUpload, attachment_ref},
    backend::StoreBackend,
    bulk::{BulkInsertReport, BulkMode, DuplicateEntry},
    document::{Document, DocumentExt, ID_FIELD, Patch, Record, RecordId, Stored},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Expr, Filter, Query},
};

/// Result of [`Collection::replace_one`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceReport {
    /// The replaced key, or the inserted one on upsert.
    pub id: RecordId,
    pub matched: u64,
    pub modified: u64,
    pub upserted: bool,
}

/// An untyped collection bound to a backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn not_found(&self, id: &RecordId) -> DocumentStoreError {
        DocumentStoreError::DocumentNotFound(id.to_string(), self.name.clone())
    }

    /// Lists every record matching `filter`, in store order.
    pub async fn find(&self, filter: Option<Expr>) -> DocumentStoreResult<Vec<Record>> {
        debug!(collection = %self.name, ?filter, "find");

        self.backend
            .query_documents(Query::filtered(filter), &self.name)
            .await
    }

    /// Returns one page of the records matching `filter`.
    pub async fn paginate(
        &self,
        params: PaginationParams,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<Page<Record>> {
        debug!(collection = %self.name, page = params.page(), per_page = params.per_page(), "paginate");

        let count = self
            .backend
            .count_documents(filter.clone(), &self.name)
            .await?;
        let items = self
            .backend
            .query_documents(
                Query::builder()
                    .maybe_filter(filter)
                    .offset(params.offset())
                    .limit(params.per_page())
                    .build(),
                &self.name,
            )
            .await?;

        Ok(params.page_of(items, count as usize))
    }

    /// Retrieves a record by key, `None` when absent.
    pub async fn find_one(&self, id: &RecordId) -> DocumentStoreResult<Option<Record>> {
        Ok(self
            .backend
            .get_documents(vec![id.clone()], &self.name)
            .await?
            .into_iter()
            .next())
    }

    /// Retrieves a record by key.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) when no record has the key.
    pub async fn find_by_id(&self, id: &RecordId) -> DocumentStoreResult<Record> {
        self.find_one(id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Lists the records whose `field` equals `value`. No match is an empty list.
    pub async fn find_by_field(
        &self,
        field: &str,
        value: impl Into<Bson>,
    ) -> DocumentStoreResult<Vec<Record>> {
        self.find(Some(Filter::eq(field, value))).await
    }

    /// Inserts a new record. A key in `_id` is kept; otherwise one is generated.
    ///
    /// # Errors
    ///
    /// [`DuplicateKey`](DocumentStoreError::DuplicateKey) when the key is taken; the existing
    /// record is left untouched.
    pub async fn insert_one(&self, fields: BsonDocument) -> DocumentStoreResult<Record> {
        self.insert_record(Record::from_input(fields)?).await
    }

    async fn insert_record(&self, record: Record) -> DocumentStoreResult<Record> {
        debug!(collection = %self.name, id = %record.id, "insert_one");

        let outcome = self
            .backend
            .insert_documents(vec![record.clone()], true, &self.name)
            .await?;

        if let Some((_, message)) = outcome.duplicates.into_iter().next() {
            warn!(collection = %self.name, id = %record.id, %message, "duplicate key on insert");
            return Err(DocumentStoreError::DuplicateKey {
                key: record.id.to_string(),
                collection: self.name.clone(),
            });
        }

        Ok(record)
    }

    /// Inserts many records under a duplicate-key policy.
    ///
    /// Duplicates are reported, not raised. In [`BulkMode::StopOnDuplicate`] nothing after the
    /// first duplicate is attempted; in [`BulkMode::ContinueOnDuplicate`] every other input is
    /// inserted and each rejected input is returned as submitted.
    pub async fn insert_many(
        &self,
        inputs: Vec<BsonDocument>,
        mode: BulkMode,
    ) -> DocumentStoreResult<BulkInsertReport> {
        let records = inputs
            .iter()
            .cloned()
            .map(Record::from_input)
            .collect::<DocumentStoreResult<Vec<_>>>()?;
        let ids = records
            .iter()
            .map(|record| record.id.clone())
            .collect::<Vec<_>>();

        debug!(collection = %self.name, count = records.len(), ?mode, "insert_many");

        let mut outcome = self
            .backend
            .insert_documents(records, mode.ordered(), &self.name)
            .await?;
        outcome.inserted.sort_unstable();
        outcome.duplicates.sort_by_key(|(index, _)| *index);

        let duplicates = outcome
            .duplicates
            .into_iter()
            .map(|(index, message)| DuplicateEntry {
                index,
                key: ids[index].clone(),
                input: inputs[index].clone(),
                message,
            })
            .collect::<Vec<_>>();

        if !duplicates.is_empty() {
            warn!(collection = %self.name, duplicates = duplicates.len(), ?mode, "duplicate keys in bulk insert");
        }

        Ok(BulkInsertReport {
            mode,
            not_attempted: inputs
                .len()
                .saturating_sub(outcome.inserted.len() + duplicates.len()),
            inserted_ids: outcome
                .inserted
                .into_iter()
                .map(|index| ids[index].clone())
                .collect(),
            duplicates,
        })
    }

    /// Merges `patch` into the record with key `id` and returns the key.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) when no record has the key.
    pub async fn update_one(&self, id: &RecordId, patch: Patch) -> DocumentStoreResult<RecordId> {
        debug!(collection = %self.name, %id, "update_one");

        if patch.is_empty() {
            return self.find_by_id(id).await.map(|record| record.id);
        }

        let matched = self
            .backend
            .update_documents(vec![id.clone()], patch.into_inner(), &self.name)
            .await?;

        if matched == 0 {
            return Err(self.not_found(id));
        }

        Ok(id.clone())
    }

    /// Merges `patch` into every record matching `filter`.
    ///
    /// Returns the keys matched before the update; no match is an empty list.
    pub async fn update_many(&self, filter: Expr, patch: Patch) -> DocumentStoreResult<Vec<RecordId>> {
        let ids = self.matching_ids(filter).await?;
        self.patch_ids(ids, patch).await
    }

    pub(crate) async fn patch_ids(
        &self,
        ids: Vec<RecordId>,
        patch: Patch,
    ) -> DocumentStoreResult<Vec<RecordId>> {
        debug!(collection = %self.name, count = ids.len(), "update_many");

        if !ids.is_empty() && !patch.is_empty() {
            self.backend
                .update_documents(ids.clone(), patch.into_inner(), &self.name)
                .await?;
        }

        Ok(ids)
    }

    /// Replaces the whole field map of the record with key `id`.
    ///
    /// With `upsert` set, a missing record is created under `id`. A `_id` inside `fields` must
    /// equal `id`.
    pub async fn replace_one(
        &self,
        id: &RecordId,
        mut fields: BsonDocument,
        upsert: bool,
    ) -> DocumentStoreResult<ReplaceReport> {
        if let Some(value) = fields.remove(ID_FIELD) {
            if RecordId::from_bson(&value)? != *id {
                return Err(DocumentStoreError::invalid_field(
                    ID_FIELD,
                    "a replacement cannot change the key",
                ));
            }
        }

        debug!(collection = %self.name, %id, upsert, "replace_one");

        let outcome = self
            .backend
            .replace_document(id.clone(), fields, upsert, &self.name)
            .await?;

        Ok(ReplaceReport {
            id: outcome.upserted.clone().unwrap_or_else(|| id.clone()),
            matched: outcome.matched,
            modified: outcome.modified,
            upserted: outcome.upserted.is_some(),
        })
    }

    /// Deletes the record with key `id` and returns the key.
    ///
    /// Attachments referenced by the record are not touched.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) when no record has the key.
    pub async fn delete_one(&self, id: &RecordId) -> DocumentStoreResult<RecordId> {
        debug!(collection = %self.name, %id, "delete_one");

        let deleted = self
            .backend
            .delete_documents(vec![id.clone()], &self.name)
            .await?;

        if deleted == 0 {
            return Err(self.not_found(id));
        }

        Ok(id.clone())
    }

    /// Merges `patch` into the record with key `id` and returns the record as it was before.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) when no record has the key.
    pub async fn find_one_and_update(&self, id: &RecordId, patch: Patch) -> DocumentStoreResult<Record> {
        let before = self.find_by_id(id).await?;
        self.update_one(id, patch).await?;

        Ok(before)
    }

    /// Replaces the fields of the record with key `id` and returns the record as it was before.
    ///
    /// Never inserts: a missing key is
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound).
    pub async fn find_one_and_replace(
        &self,
        id: &RecordId,
        fields: BsonDocument,
    ) -> DocumentStoreResult<Record> {
        let before = self.find_by_id(id).await?;

        if self.replace_one(id, fields, false).await?.matched == 0 {
            return Err(self.not_found(id));
        }

        Ok(before)
    }

    /// Deletes the record with key `id` and returns it.
    pub async fn find_one_and_delete(&self, id: &RecordId) -> DocumentStoreResult<Record> {
        let before = self.find_by_id(id).await?;
        self.delete_one(id).await?;

        Ok(before)
    }

    /// Deletes every record matching `filter` and returns the keys matched before deleting.
    pub async fn delete_many(&self, filter: Expr) -> DocumentStoreResult<Vec<RecordId>> {
        let ids = self.matching_ids(filter).await?;

        debug!(collection = %self.name, count = ids.len(), "delete_many");

        if !ids.is_empty() {
            self.backend
                .delete_documents(ids.clone(), &self.name)
                .await?;
        }

        Ok(ids)
    }

    async fn matching_ids(&self, filter: Expr) -> DocumentStoreResult<Vec<RecordId>> {
        Ok(self
            .find(Some(filter))
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// Saves `upload` and links it into `field` of an existing record.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) for an unknown parent, and a
    /// validation error when the parent already has an attachment in `field`.
    pub async fn store_attachment(
        &self,
        id: &RecordId,
        field: &str,
        upload: AttachmentUpload,
    ) -> DocumentStoreResult<Record> {
        let mut record = self.find_by_id(id).await?;

        if attachment_ref(record.fields.get(field), field)?.is_some() {
            return Err(DocumentStoreError::invalid_field(
                field,
                "the record already has an attachment, delete it first",
            ));
        }

        let attachment_id = self.backend.put_attachment(upload).await?;
        let matched = self
            .backend
            .update_documents(
                vec![id.clone()],
                BsonDocument::from_iter([(field.to_string(), Bson::ObjectId(attachment_id))]),
                &self.name,
            )
            .await?;

        if matched == 0 {
            // Parent vanished after the read; drop the now unreferenced upload.
            self.backend.delete_attachment(attachment_id).await?;
            return Err(self.not_found(id));
        }

        debug!(collection = %self.name, %id, attachment = %attachment_id, "attachment stored");

        record
            .fields
            .insert(field, Bson::ObjectId(attachment_id));

        Ok(record)
    }

    /// Saves `upload` and inserts a new record referencing it from `field`.
    pub async fn insert_with_attachment(
        &self,
        fields: BsonDocument,
        field: &str,
        upload: AttachmentUpload,
    ) -> DocumentStoreResult<Record> {
        let mut record = Record::from_input(fields)?;
        let attachment_id = self.backend.put_attachment(upload).await?;

        record
            .fields
            .insert(field, Bson::ObjectId(attachment_id));

        match self.insert_record(record).await {
            Ok(record) => Ok(record),
            Err(err) => {
                self.backend.delete_attachment(attachment_id).await?;
                Err(err)
            }
        }
    }

    /// Reads the attachment referenced from `field` of the record with key `id`.
    ///
    /// # Errors
    ///
    /// [`DocumentNotFound`](DocumentStoreError::DocumentNotFound) for an unknown parent,
    /// [`AttachmentNotFound`](DocumentStoreError::AttachmentNotFound) when the parent has no
    /// attachment or the attachment is gone.
    pub async fn read_attachment(&self, id: &RecordId, field: &str) -> DocumentStoreResult<Attachment> {
        let record = self.find_by_id(id).await?;
        let reference = attachment_ref(record.fields.get(field), field)?
            .ok_or_else(|| DocumentStoreError::AttachmentNotFound(format!("{id} has no {field}")))?;

        self.backend
            .get_attachment(reference)
            .await?
            .ok_or_else(|| DocumentStoreError::AttachmentNotFound(reference.to_hex()))
    }

    /// Deletes the attachment referenced from `field`, then the record itself.
    ///
    /// The attachment goes first: deleting the parent first would lose the only reference to it.
    pub async fn delete_with_attachment(&self, id: &RecordId, field: &str) -> DocumentStoreResult<()> {
        let record = self.find_by_id(id).await?;

        if let Some(reference) = attachment_ref(record.fields.get(field), field)? {
            if !self.backend.delete_attachment(reference).await? {
                warn!(collection = %self.name, %id, attachment = %reference, "referenced attachment already gone");
            }
        }

        self.delete_one(id).await?;

        Ok(())
    }
}

/// A collection of typed documents.
///
/// Every operation of [`Collection`] is available; inputs are checked against `D` and outputs
/// are returned as [`Stored<D>`].
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self {
            inner: Collection::new(name, backend),
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    fn typed(records: Vec<Record>) -> DocumentStoreResult<Vec<Stored<D>>> {
        records
            .into_iter()
            .map(Stored::from_record)
            .collect()
    }

    pub async fn find(&self, filter: Option<Expr>) -> DocumentStoreResult<Vec<Stored<D>>> {
        Self::typed(self.inner.find(filter).await?)
    }

    pub async fn paginate(
        &self,
        params: PaginationParams,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<Page<Stored<D>>> {
        self.inner
            .paginate(params, filter)
            .await?
            .try_map(Stored::from_record)
    }

    pub async fn find_by_id(&self, id: &RecordId) -> DocumentStoreResult<Stored<D>> {
        Stored::from_record(self.inner.find_by_id(id).await?)
    }

    pub async fn find_by_field(
        &self,
        field: &str,
        value: impl Into<Bson>,
    ) -> DocumentStoreResult<Vec<Stored<D>>> {
        Self::typed(self.inner.find_by_field(field, value).await?)
    }

    /// Inserts a document under a freshly generated key.
    pub async fn insert_one(&self, document: D) -> DocumentStoreResult<Stored<D>> {
        let record = self.inner.insert_one(document.to_fields()?).await?;

        Ok(Stored { id: record.id, document })
    }

    /// Applies `patch` to `fields`, validates the result against `D` and returns the patch as
    /// `D` stores it: each patched key carries the value from the re-encoded document, so a hex
    /// string for an ObjectId field is written as an ObjectId. A key the re-encoded document
    /// leaves out (a cleared optional field) is written as null.
    fn conformed_patch(mut fields: BsonDocument, patch: &Patch) -> DocumentStoreResult<Patch> {
        patch.apply_to(&mut fields);
        let typed = D::from_fields(fields)?.to_fields()?;

        Patch::new(
            patch
                .fields()
                .keys()
                .map(|key| (key.clone(), typed.get(key).cloned().unwrap_or(Bson::Null)))
                .collect(),
        )
    }

    /// Merges `patch` into the document with key `id`.
    ///
    /// Patched values are stored in the form `D` serializes them to, the same form
    /// [`TypedCollection::insert_one`] writes.
    ///
    /// # Errors
    ///
    /// A validation error when the patched document no longer fits `D`; nothing is written then.
    pub async fn update_one(&self, id: &RecordId, patch: Patch) -> DocumentStoreResult<RecordId> {
        let record = self.inner.find_by_id(id).await?;
        let patch = Self::conformed_patch(record.fields, &patch)?;

        self.inner.update_one(id, patch).await
    }

    /// Merges `patch` into every document matching `filter`; returns the pre-update matches.
    ///
    /// Every patched document is validated before anything is written. Records whose
    /// conformed patch comes out the same are written together.
    pub async fn update_many(&self, filter: Expr, patch: Patch) -> DocumentStoreResult<Vec<RecordId>> {
        let records = self.inner.find(Some(filter)).await?;
        let ids = records.iter().map(|record| record.id.clone()).collect::<Vec<_>>();
        let mut batches: Vec<(Patch, Vec<RecordId>)> = Vec::new();

        for record in records {
            let conformed = Self::conformed_patch(record.fields, &patch)?;
            match batches.iter_mut().find(|(batch, _)| *batch == conformed) {
                Some((_, batch_ids)) => batch_ids.push(record.id),
                None => batches.push((conformed, vec![record.id])),
            }
        }

        for (conformed, batch_ids) in batches {
            self.inner.patch_ids(batch_ids, conformed).await?;
        }

        Ok(ids)
    }

    pub async fn delete_one(&self, id: &RecordId) -> DocumentStoreResult<RecordId> {
        self.inner.delete_one(id).await
    }

    pub async fn delete_many(&self, filter: Expr) -> DocumentStoreResult<Vec<RecordId>> {
        self.inner.delete_many(filter).await
    }

    pub async fn insert_with_attachment(
        &self,
        document: D,
        field: &str,
        upload: AttachmentUpload,
    ) -> DocumentStoreResult<Stored<D>> {
        Stored::from_record(
            self.inner
                .insert_with_attachment(document.to_fields()?, field, upload)
                .await?,
        )
    }

    pub async fn store_attachment(
        &self,
        id: &RecordId,
        field: &str,
        upload: AttachmentUpload,
    ) -> DocumentStoreResult<Stored<D>> {
        Stored::from_record(self.inner.store_attachment(id, field, upload).await?)
    }

    pub async fn read_attachment(&self, id: &RecordId, field: &str) -> DocumentStoreResult<Attachment> {
        self.inner.read_attachment(id, field).await
    }

    pub async fn delete_with_attachment(&self, id: &RecordId, field: &str) -> DocumentStoreResult<()> {
        self.inner.delete_with_attachment(id, field).await
    }
}
