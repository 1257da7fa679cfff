//! Bulk insert policies and their reports.
//!
//! A bulk insert never throws on the first duplicate key. It returns a [`BulkInsertReport`]
//! that lists what went in and, for every rejected input, the input itself and the reason, so
//! callers can decide what to do with the rejects.

use std::str::FromStr;

use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::{RecordId, bson_to_json};

/// What a bulk insert does when it meets a duplicate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    /// Ordered insert: stop at the first duplicate, leave the rest untouched.
    #[default]
    #[serde(alias = "stop")]
    StopOnDuplicate,
    /// Unordered insert: skip duplicates and insert everything else.
    #[serde(alias = "continue")]
    ContinueOnDuplicate,
}

impl BulkMode {
    /// Whether the store must apply the inserts in order and stop at the first failure.
    pub fn ordered(self) -> bool {
        matches!(self, BulkMode::StopOnDuplicate)
    }
}

impl FromStr for BulkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" | "stop_on_duplicate" => Ok(BulkMode::StopOnDuplicate),
            "continue" | "continue_on_duplicate" => Ok(BulkMode::ContinueOnDuplicate),
            other => Err(format!("unknown bulk mode `{other}`")),
        }
    }
}

/// Per-input outcome of a backend bulk insert.
///
/// Indexes refer to positions in the batch handed to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub inserted: Vec<usize>,
    pub duplicates: Vec<(usize, String)>,
}

/// An input rejected because its key already existed.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateEntry {
    /// Position of the input in the request.
    pub index: usize,
    /// The colliding key.
    pub key: RecordId,
    /// The input exactly as it was submitted, key included.
    pub input: BsonDocument,
    /// The store's explanation.
    pub message: String,
}

/// Result of a bulk insert.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkInsertReport {
    pub mode: BulkMode,
    /// Keys of the inserted records, in input order.
    pub inserted_ids: Vec<RecordId>,
    /// Rejected inputs, in input order. At most one in stop mode.
    pub duplicates: Vec<DuplicateEntry>,
    /// Inputs after the failure point that were never tried (stop mode only).
    pub not_attempted: usize,
}

impl BulkInsertReport {
    /// `true` when every input was inserted.
    pub fn is_complete(&self) -> bool {
        self.duplicates.is_empty() && self.not_attempted == 0
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }

    /// JSON rendering used by the HTTP layer.
    pub fn to_json(&self) -> Value {
        let message = match (self.is_complete(), self.mode) {
            (true, _) => "success",
            (false, BulkMode::StopOnDuplicate) => "duplicate key encountered, insert aborted",
            (false, BulkMode::ContinueOnDuplicate) => "duplicates encountered and ignored",
        };

        json!({
            "message": message,
            "mode": self.mode,
            "inserted": self.inserted_count(),
            "insertedIds": self.inserted_ids,
            "notAttempted": self.not_attempted,
            "duplicates": self
                .duplicates
                .iter()
                .map(|entry| bson_to_json(&bson::Bson::Document(entry.input.clone())))
                .collect::<Vec<_>>(),
            "writeErrors": self
                .duplicates
                .iter()
                .map(|entry| json!({
                    "index": entry.index,
                    "keyValue": entry.key,
                    "errmsg": entry.message,
                }))
                .collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn mode_names() {
        assert_eq!(
            serde_json::from_str::<BulkMode>(r#""continue""#).unwrap(),
            BulkMode::ContinueOnDuplicate
        );
        assert_eq!(
            serde_json::from_str::<BulkMode>(r#""stop_on_duplicate""#).unwrap(),
            BulkMode::StopOnDuplicate
        );
        assert!(BulkMode::default().ordered());
        assert_eq!("continue".parse::<BulkMode>(), Ok(BulkMode::ContinueOnDuplicate));
        assert!("skip".parse::<BulkMode>().is_err());
    }

    #[test]
    fn report_lists_rejected_inputs() {
        let report = BulkInsertReport {
            mode: BulkMode::ContinueOnDuplicate,
            inserted_ids: vec![RecordId::Int(8)],
            duplicates: vec![DuplicateEntry {
                index: 0,
                key: RecordId::Int(1),
                input: doc! { "_id": 1, "title": "todo title one " },
                message: "duplicate key".into(),
            }],
            not_attempted: 0,
        };

        let value = report.to_json();

        assert!(!report.is_complete());
        assert_eq!(value["message"], "duplicates encountered and ignored");
        assert_eq!(value["inserted"], 1);
        assert_eq!(value["duplicates"][0]["title"], "todo title one ");
        assert_eq!(value["writeErrors"][0]["keyValue"], 1);
    }
}
