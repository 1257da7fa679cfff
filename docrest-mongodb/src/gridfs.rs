//! Attachment storage in GridFS.
//!
//! Files go into the database's default bucket (`fs.files` / `fs.chunks`). The content type is
//! kept in the file's metadata under `contentType`.

use bson::{Bson, doc, oid::ObjectId};
use futures::io::{AsyncReadExt, AsyncWriteExt};
use mongodb::{Database, gridfs::{FilesCollectionDocument, GridFsBucket}};
use tracing::debug;

use docrest_core::{
    attachment::{Attachment, AttachmentInfo, AttachmentUpload, DEFAULT_CONTENT_TYPE},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::error::map_error;

#[derive(Debug, Clone)]
pub(crate) struct AttachmentBucket {
    bucket: GridFsBucket,
}

fn io_error(err: std::io::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(format!("gridfs stream failed: {err}"))
}

impl AttachmentBucket {
    pub(crate) fn new(database: &Database) -> Self {
        Self {
            bucket: database.gridfs_bucket(None),
        }
    }

    pub(crate) async fn put(&self, upload: AttachmentUpload) -> DocumentStoreResult<ObjectId> {
        let id = ObjectId::new();
        let mut stream = self
            .bucket
            .open_upload_stream(&upload.filename)
            .id(Bson::ObjectId(id))
            .metadata(doc! { "contentType": &upload.content_type })
            .await
            .map_err(map_error)?;

        stream
            .write_all(&upload.data)
            .await
            .map_err(io_error)?;
        stream
            .close()
            .await
            .map_err(io_error)?;

        debug!(attachment = %id, length = upload.data.len(), "gridfs upload complete");

        Ok(id)
    }

    async fn find_file(&self, id: ObjectId) -> DocumentStoreResult<Option<FilesCollectionDocument>> {
        self.bucket
            .find_one(doc! { "_id": id })
            .await
            .map_err(map_error)
    }

    pub(crate) async fn get(&self, id: ObjectId) -> DocumentStoreResult<Option<Attachment>> {
        match self.find_file(id).await? {
            Some(file) => self.read(file).await.map(Some),
            None => Ok(None),
        }
    }

    /// The newest revision stored under `filename`.
    pub(crate) async fn get_by_name(&self, filename: &str) -> DocumentStoreResult<Option<Attachment>> {
        let file = self
            .bucket
            .find_one(doc! { "filename": filename })
            .sort(doc! { "uploadDate": -1 })
            .await
            .map_err(map_error)?;

        match file {
            Some(file) => self.read(file).await.map(Some),
            None => Ok(None),
        }
    }

    async fn read(&self, file: FilesCollectionDocument) -> DocumentStoreResult<Attachment> {
        let id = file.id.as_object_id().ok_or_else(|| {
            DocumentStoreError::Backend(format!("gridfs file {} is not keyed by an ObjectId", file.id))
        })?;

        let mut stream = self
            .bucket
            .open_download_stream(Bson::ObjectId(id))
            .await
            .map_err(map_error)?;
        let mut data = Vec::with_capacity(file.length as usize);
        stream
            .read_to_end(&mut data)
            .await
            .map_err(io_error)?;

        let content_type = file
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get_str("contentType").ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Ok(Attachment {
            info: AttachmentInfo {
                id,
                filename: file.filename.clone().unwrap_or_default(),
                content_type,
                length: file.length,
                uploaded_at: file.upload_date.to_chrono(),
            },
            data,
        })
    }

    pub(crate) async fn delete(&self, id: ObjectId) -> DocumentStoreResult<bool> {
        if self.find_file(id).await?.is_none() {
            return Ok(false);
        }

        self.bucket
            .delete(Bson::ObjectId(id))
            .await
            .map_err(map_error)?;

        Ok(true)
    }
}
