//! Mapping of driver errors onto [`DocumentStoreError`].

use std::collections::HashSet;
use mongodb::error::{Error, ErrorKind, WriteFailure};

use docrest_core::{bulk::InsertOutcome, error::{DocumentStoreError, DocumentStoreResult}};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Converts a driver error, keeping unreachable-server failures apart from the rest.
pub(crate) fn map_error(err: Error) -> DocumentStoreError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => DocumentStoreError::StoreUnavailable(err.to_string()),
        _ => DocumentStoreError::Backend(err.to_string()),
    }
}

/// Rebuilds the per-input outcome of a failed `insertMany` of `total` documents.
///
/// Only duplicate key failures become an outcome; any other write error, or a write concern
/// error, is returned as an error.
pub(crate) fn insert_outcome(err: Error, total: usize, ordered: bool) -> DocumentStoreResult<InsertOutcome> {
    let failures = match err.kind.as_ref() {
        ErrorKind::InsertMany(insert_error) if insert_error.write_concern_error.is_none() => Some(
            insert_error
                .write_errors
                .iter()
                .flatten()
                .map(|write_error| (write_error.index, write_error.code, write_error.message.clone()))
                .collect::<Vec<_>>(),
        ),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if total == 1 => {
            Some(vec![(0, write_error.code, write_error.message.clone())])
        }
        _ => None,
    };

    failures
        .and_then(|failures| duplicate_outcome(failures, total, ordered))
        .ok_or_else(|| map_error(err))
}

/// Builds the outcome of an insert of `total` documents from its `(index, code, message)`
/// write failures.
///
/// Returns `None` unless every failure is a duplicate key and there is at least one.
pub(crate) fn duplicate_outcome(
    mut failures: Vec<(usize, i32, String)>,
    total: usize,
    ordered: bool,
) -> Option<InsertOutcome> {
    if failures.is_empty() || failures.iter().any(|(_, code, _)| *code != DUPLICATE_KEY_CODE) {
        return None;
    }

    failures.sort_by_key(|(index, _, _)| *index);

    let failed = failures
        .iter()
        .map(|(index, _, _)| *index)
        .collect::<HashSet<_>>();
    // An ordered insert never gets past its first failure.
    let attempted = if ordered { failures[0].0 } else { total };

    Some(InsertOutcome {
        inserted: (0..attempted)
            .filter(|index| !failed.contains(index))
            .collect(),
        duplicates: failures
            .into_iter()
            .map(|(index, _, message)| (index, message))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicate(index: usize) -> (usize, i32, String) {
        (index, DUPLICATE_KEY_CODE, format!("E11000 duplicate key error at {index}"))
    }

    #[test]
    fn ordered_insert_stops_at_the_first_duplicate() {
        let outcome = duplicate_outcome(vec![duplicate(3)], 6, true).unwrap();

        assert_eq!(outcome.inserted, vec![0, 1, 2]);
        assert_eq!(outcome.duplicates, vec![(3, "E11000 duplicate key error at 3".to_string())]);
    }

    #[test]
    fn unordered_insert_tries_every_input() {
        let outcome = duplicate_outcome(vec![duplicate(4), duplicate(1)], 6, false).unwrap();

        assert_eq!(outcome.inserted, vec![0, 2, 3, 5]);
        assert_eq!(
            outcome.duplicates.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
            vec![1, 4]
        );
    }

    #[test]
    fn other_write_errors_are_not_an_outcome() {
        let failures = vec![duplicate(0), (2, 121, "Document failed validation".to_string())];

        assert!(duplicate_outcome(failures, 3, false).is_none());
        assert!(duplicate_outcome(vec![], 3, true).is_none());
    }
}
