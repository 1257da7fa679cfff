//! Field name sanitization for MongoDB compatibility.
//!
//! MongoDB restricts field names: dots address nested fields, a leading dollar sign marks an
//! operator and NUL terminates the name. Records created over HTTP may carry any of these in
//! their keys, so keys are escaped on the way in and restored on the way out. Values are stored
//! untouched.

use bson::{Bson, Document};


/// Escapes and restores field names.
pub(crate) struct ValueSanitizer;

impl ValueSanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Escapes every key of a document, recursing into sub-documents and arrays.
    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
            .collect()
    }

    fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            _ => value.clone(),
        }
    }

    /// Escapes a single field name.
    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    /// Escapes each segment of a dotted query path, keeping the dots that separate them.
    pub(crate) fn sanitize_path(path: &str) -> String {
        path.split('.')
            .map(Self::sanitize_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Inverse of [`ValueSanitizer::sanitize_document`].
    pub(crate) fn restore_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
            .collect()
    }

    fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::restore_document(doc)),
            _ => value.clone(),
        }
    }

    /// Restores a string by reverting sanitization escapes.
    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}
