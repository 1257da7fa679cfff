//! Error types and result types for document store operations.
//!
//! Every layer of docrest reports failures with [`DocumentStoreError`]. The variants are split so
//! that callers can tell a missing record, a rejected input, a key collision and an unreachable
//! store apart without looking at message text.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// Input was rejected before reaching the store.
    /// `field` names the offending field when it is known.
    #[error("Validation failed: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    /// A record with the given key already exists in the collection.
    #[error("Duplicate key {key} in collection {collection}")]
    DuplicateKey {
        key: String,
        collection: String,
    },
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The parent exists but carries no attachment, or the referenced attachment is gone.
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),
    /// The document has an invalid structure for the store (e.g. not a map, bad `_id`).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Builds a validation error that names the offending field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        DocumentStoreError::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Converts a decoding failure of user input into a validation error.
    ///
    /// serde reports missing and unknown fields as ``missing field `title` ``; the name between
    /// the backticks is lifted into `field`.
    pub fn from_input(err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        let field = message
            .split('`')
            .nth(1)
            .filter(|_| message.contains("field"))
            .map(str::to_string);

        DocumentStoreError::Validation { field, message }
    }

    /// Returns `true` for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::AttachmentNotFound(_)
        )
    }

    /// A short, stable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentStoreError::Serialization(_) => "serialization",
            DocumentStoreError::Initialization(_) => "initialization",
            DocumentStoreError::Validation { .. } => "validation",
            DocumentStoreError::DuplicateKey { .. } => "duplicate_key",
            DocumentStoreError::DocumentNotFound(..) => "not_found",
            DocumentStoreError::AttachmentNotFound(_) => "attachment_not_found",
            DocumentStoreError::InvalidDocument(_) => "invalid_document",
            DocumentStoreError::StoreUnavailable(_) => "store_unavailable",
            DocumentStoreError::Backend(_) => "backend",
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Movie {
        title: String,
        year: Option<i32>,
    }

    #[test]
    fn missing_field_is_named() {
        let err = serde_json::from_str::<Movie>(r#"{"year": 2009}"#).unwrap_err();

        match DocumentStoreError::from_input(err) {
            DocumentStoreError::Validation { field, message } => {
                assert_eq!(field.as_deref(), Some("title"));
                assert!(message.contains("missing field"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn type_mismatch_has_no_field_name() {
        let err = serde_json::from_str::<Movie>(r#"{"title": 3}"#).unwrap_err();

        assert!(matches!(
            DocumentStoreError::from_input(err),
            DocumentStoreError::Validation { field: None, .. }
        ));
    }

    #[test]
    fn not_found_family() {
        assert!(DocumentStoreError::DocumentNotFound("1".into(), "todos".into()).is_not_found());
        assert!(DocumentStoreError::AttachmentNotFound("x".into()).is_not_found());
        assert!(!DocumentStoreError::Backend("boom".into()).is_not_found());
    }
}
