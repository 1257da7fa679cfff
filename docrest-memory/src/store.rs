//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON maps (key included) in HashMaps behind async-safe read-write
//! locks. Every insert takes a sequence number, so listings come back in insertion order the way
//! a document database returns its natural order.

use std::{
    collections::HashMap,
    sync::{Arc, atomic::{AtomicU64, Ordering as AtomicOrdering}},
};
use async_trait::async_trait;
use bson::{Document as BsonDocument, oid::ObjectId};
use chrono::Utc;
use mea::rwlock::RwLock;
use tracing::debug;

use docrest_core::{
    attachment::{Attachment, AttachmentInfo, AttachmentUpload},
    backend::{ReplaceOutcome, StoreBackend, StoreBackendBuilder},
    bulk::InsertOutcome,
    document::{Record, RecordId},
    error::DocumentStoreResult,
    query::{Expr, Query},
};

use crate::evaluator::DocumentEvaluator;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    document: BsonDocument,
}

type CollectionMap = HashMap<RecordId, Entry>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Clones share the same
/// data, which lets tests keep a handle on the backend a server is using.
///
/// # Performance
///
/// Queries scan the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest_core::{backend::StoreBackend, document::{Record, RecordId}};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let record = Record::new(RecordId::Int(1), doc! { "title": "todo title one" });
/// store.insert_documents(vec![record], true, "todos").await?;
///
/// let records = store.get_documents(vec![RecordId::Int(1)], "todos").await?;
/// assert_eq!(records.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (key -> document)
    store: Arc<RwLock<StoreMap>>,
    /// The binary-object area, shared by all collections.
    attachments: Arc<RwLock<HashMap<ObjectId, Attachment>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, AtomicOrdering::Relaxed)
    }
}

fn duplicate_message(collection: &str, id: &RecordId) -> String {
    format!("E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {id} }}")
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(
        &self,
        records: Vec<Record>,
        ordered: bool,
        collection: &str,
    ) -> DocumentStoreResult<InsertOutcome> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();
        let mut outcome = InsertOutcome::default();

        for (index, record) in records.into_iter().enumerate() {
            if collection_map.contains_key(&record.id) {
                outcome
                    .duplicates
                    .push((index, duplicate_message(collection, &record.id)));

                if ordered {
                    break;
                }
                continue;
            }

            let entry = Entry {
                seq: self.next_seq(),
                document: record.clone().into_document(),
            };

            collection_map.insert(record.id, entry);
            outcome.inserted.push(index);
        }

        debug!(collection, inserted = outcome.inserted.len(), duplicates = outcome.duplicates.len(), "memory insert");

        Ok(outcome)
    }

    async fn update_documents(
        &self,
        ids: Vec<RecordId>,
        patch: BsonDocument,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };
        let mut matched = 0;

        for id in ids {
            if let Some(entry) = collection_map.get_mut(&id) {
                for (key, value) in &patch {
                    entry
                        .document
                        .insert(key.clone(), value.clone());
                }
                matched += 1;
            }
        }

        Ok(matched)
    }

    async fn replace_document(
        &self,
        id: RecordId,
        fields: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<ReplaceOutcome> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();
        let document = Record::new(id.clone(), fields).into_document();

        match collection_map.get_mut(&id) {
            Some(entry) => {
                let modified = (entry.document != document) as u64;
                entry.document = document;

                Ok(ReplaceOutcome { matched: 1, modified, upserted: None })
            }
            None if upsert => {
                let entry = Entry { seq: self.next_seq(), document };
                collection_map.insert(id.clone(), entry);

                Ok(ReplaceOutcome { matched: 0, modified: 0, upserted: Some(id) })
            }
            None => Ok(ReplaceOutcome::default()),
        }
    }

    async fn delete_documents(&self, ids: Vec<RecordId>, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return Ok(0);
        };

        Ok(ids
            .iter()
            .filter(|id| collection_map.remove(*id).is_some())
            .count() as u64)
    }

    async fn get_documents(
        &self,
        ids: Vec<RecordId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        ids.iter()
            .filter_map(|id| collection_map.get(id))
            .map(|entry| Record::from_document(entry.document.clone()))
            .collect()
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut entries = Vec::with_capacity(collection_map.len());
        for entry in collection_map.values() {
            let keep = match &query.filter {
                Some(filter) => DocumentEvaluator::new(&entry.document).evaluate(filter)?,
                None => true,
            };
            if keep {
                entries.push(entry);
            }
        }

        entries.sort_by_key(|entry| entry.seq);

        entries
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|entry| Record::from_document(entry.document.clone()))
            .collect()
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(0);
        };
        let Some(filter) = filter else {
            return Ok(collection_map.len() as u64);
        };

        let mut count = 0;
        for entry in collection_map.values() {
            if DocumentEvaluator::new(&entry.document).evaluate(&filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn put_attachment(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId> {
        let id = ObjectId::new();
        let attachment = Attachment {
            info: AttachmentInfo {
                id,
                filename: upload.filename,
                content_type: upload.content_type,
                length: upload.data.len() as u64,
                uploaded_at: Utc::now(),
            },
            data: upload.data,
        };

        self.attachments
            .write()
            .await
            .insert(id, attachment);

        Ok(id)
    }

    async fn get_attachment(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>> {
        Ok(self
            .attachments
            .read()
            .await
            .get(&id)
            .cloned())
    }

    async fn find_attachment_by_name(&self, filename: &str) -> DocumentStoreResult<Option<Attachment>> {
        Ok(self
            .attachments
            .read()
            .await
            .values()
            .filter(|attachment| attachment.info.filename == filename)
            .max_by_key(|attachment| (attachment.info.uploaded_at, attachment.info.id))
            .cloned())
    }

    async fn delete_attachment(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        Ok(self
            .attachments
            .write()
            .await
            .remove(&id)
            .is_some())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docrest_memory::InMemoryStore;
/// use docrest_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Always succeeds with an empty store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docrest_core::query::Filter;

    fn todo(id: i64, title: &str) -> Record {
        Record::new(RecordId::Int(id), doc! { "title": title })
    }

    #[tokio::test]
    async fn ordered_insert_stops_at_first_duplicate() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![todo(2, "existing")], true, "todos")
            .await
            .unwrap();

        let outcome = store
            .insert_documents(vec![todo(1, "a"), todo(2, "b"), todo(3, "c")], true, "todos")
            .await
            .unwrap();

        assert_eq!(outcome.inserted, vec![0]);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].0, 1);
        assert_eq!(store.count_documents(None, "todos").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unordered_insert_skips_duplicates() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![todo(2, "existing")], true, "todos")
            .await
            .unwrap();

        let outcome = store
            .insert_documents(vec![todo(2, "b"), todo(3, "c"), todo(3, "d")], false, "todos")
            .await
            .unwrap();

        assert_eq!(outcome.inserted, vec![1]);
        assert_eq!(outcome.duplicates.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 2]);

        let stored = store
            .get_documents(vec![RecordId::Int(2)], "todos")
            .await
            .unwrap();
        assert_eq!(stored[0].fields.get_str("title").unwrap(), "existing");
    }

    #[tokio::test]
    async fn listing_keeps_insertion_order() {
        let store = InMemoryStore::new();
        let records = (1..=6)
            .rev()
            .map(|id| todo(id, "t"))
            .collect::<Vec<_>>();
        store
            .insert_documents(records, true, "todos")
            .await
            .unwrap();

        let page = store
            .query_documents(Query::builder().offset(2).limit(2).build(), "todos")
            .await
            .unwrap();

        assert_eq!(
            page.into_iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![RecordId::Int(4), RecordId::Int(3)]
        );
    }

    #[tokio::test]
    async fn replace_upserts_only_when_asked() {
        let store = InMemoryStore::new();

        let missed = store
            .replace_document(RecordId::Int(9), doc! { "title": "x" }, false, "todos")
            .await
            .unwrap();
        assert_eq!(missed, ReplaceOutcome::default());

        let upserted = store
            .replace_document(RecordId::Int(9), doc! { "title": "x" }, true, "todos")
            .await
            .unwrap();
        assert_eq!(upserted.upserted, Some(RecordId::Int(9)));

        let replaced = store
            .replace_document(RecordId::Int(9), doc! { "title": "y" }, true, "todos")
            .await
            .unwrap();
        assert_eq!((replaced.matched, replaced.modified), (1, 1));
    }

    #[tokio::test]
    async fn filters_on_keys() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![todo(1, "a"), todo(2, "b"), todo(3, "c")], true, "todos")
            .await
            .unwrap();

        let ids = [RecordId::Int(1), RecordId::Int(3)];
        let count = store
            .count_documents(Some(Filter::id_in(&ids)), "todos")
            .await
            .unwrap();

        assert_eq!(count, 2);
    }
}
