use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, info};
use docrest_core::{
    attachment::{Attachment, AttachmentUpload},
    backend::{ReplaceOutcome, StoreBackend, StoreBackendBuilder},
    bulk::InsertOutcome,
    document::{Record, RecordId},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query},
};

use crate::{
    error::{insert_outcome, map_error},
    gridfs::AttachmentBucket,
    query::MongoQueryTranslator,
    sanitizer::ValueSanitizer,
};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    attachments: AttachmentBucket,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        let attachments = AttachmentBucket::new(&client.database(&database));

        Self { client, database, attachments }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(record: Record) -> Document {
        ValueSanitizer::sanitize_document(&record.into_document())
    }

    fn restore_document(document: &Document) -> DocumentStoreResult<Record> {
        Record::from_document(ValueSanitizer::restore_document(document))
    }

    fn id_filter(ids: &[RecordId]) -> Document {
        doc! {
            "_id": {
                "$in": ids
                    .iter()
                    .map(RecordId::to_bson)
                    .collect::<Vec<Bson>>(),
            }
        }
    }

    async fn find_records(&self, filter: Document, options: FindOptions, collection: &str) -> DocumentStoreResult<Vec<Record>> {
        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)?
            .iter()
            .map(Self::restore_document)
            .collect::<DocumentStoreResult<Vec<Record>>>()
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(
        &self,
        records: Vec<Record>,
        ordered: bool,
        collection: &str,
    ) -> DocumentStoreResult<InsertOutcome> {
        let total = records.len();
        if total == 0 {
            return Ok(InsertOutcome::default());
        }

        let result = self
            .get_collection(collection)
            .insert_many(
                records
                    .into_iter()
                    .map(Self::prepare_document)
                    .collect::<Vec<Document>>(),
            )
            .ordered(ordered)
            .await;

        let outcome = match result {
            Ok(_) => InsertOutcome {
                inserted: (0..total).collect(),
                duplicates: Vec::new(),
            },
            Err(err) => insert_outcome(err, total, ordered)?,
        };

        debug!(collection, inserted = outcome.inserted.len(), duplicates = outcome.duplicates.len(), "mongodb insert");

        Ok(outcome)
    }

    async fn update_documents(
        &self,
        ids: Vec<RecordId>,
        patch: Document,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .update_many(
                Self::id_filter(&ids),
                doc! { "$set": ValueSanitizer::sanitize_document(&patch) },
            )
            .await
            .map_err(map_error)?
            .matched_count)
    }

    async fn replace_document(
        &self,
        id: RecordId,
        fields: Document,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<ReplaceOutcome> {
        let result = self
            .get_collection(collection)
            .replace_one(
                doc! { "_id": id.to_bson() },
                ValueSanitizer::sanitize_document(&fields),
            )
            .upsert(upsert)
            .await
            .map_err(map_error)?;

        Ok(ReplaceOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result
                .upserted_id
                .as_ref()
                .map(RecordId::from_bson)
                .transpose()?,
        })
    }

    async fn delete_documents(&self, ids: Vec<RecordId>, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(Self::id_filter(&ids))
            .await
            .map_err(map_error)?
            .deleted_count)
    }

    async fn get_documents(
        &self,
        ids: Vec<RecordId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        self.find_records(Self::id_filter(&ids), FindOptions::default(), collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Record>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        self.find_records(
            MongoQueryTranslator::translate(query.filter.as_ref())?,
            options,
            collection,
        )
        .await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter.as_ref())?)
            .await
            .map_err(map_error)
    }

    async fn put_attachment(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId> {
        self.attachments.put(upload).await
    }

    async fn get_attachment(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>> {
        self.attachments.get(id).await
    }

    async fn find_attachment_by_name(&self, filename: &str) -> DocumentStoreResult<Option<Attachment>> {
        self.attachments.get_by_name(filename).await
    }

    async fn delete_attachment(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        self.attachments.delete(id).await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        self.client
            .clone()
            .shutdown()
            .await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Parses the connection string and creates the client.
    ///
    /// The driver connects lazily: an unreachable server surfaces on the first operation as
    /// [`StoreUnavailable`](DocumentStoreError::StoreUnavailable), not here.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        options.app_name = Some("docrest".to_string());

        info!(database = %self.database, hosts = ?options.hosts, "mongodb client configured");

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
