//! Binary attachments.
//!
//! Attachments live in the store's binary-object area, apart from the record that points to
//! them. A parent only holds the attachment's ObjectId in one of its fields, so deleting the
//! parent leaves the attachment behind unless it is deleted first.

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Content type used when the uploader did not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file handed to the store for saving.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl AttachmentUpload {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            data,
        }
    }
}

/// Metadata kept for a stored attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentInfo {
    #[serde(serialize_with = "serialize_oid")]
    pub id: ObjectId,
    pub filename: String,
    pub content_type: String,
    pub length: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A stored attachment read back with its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub info: AttachmentInfo,
    pub data: Vec<u8>,
}

fn serialize_oid<S: serde::Serializer>(oid: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&oid.to_hex())
}

/// Reads the attachment reference out of a parent field.
///
/// A missing or null field means the parent has no attachment.
pub fn attachment_ref(value: Option<&Bson>, field: &str) -> DocumentStoreResult<Option<ObjectId>> {
    match value {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::ObjectId(oid)) => Ok(Some(*oid)),
        Some(other) => Err(DocumentStoreError::InvalidDocument(format!(
            "field {field} holds {:?}, expected an attachment reference",
            other.element_type(),
        ))),
    }
}
