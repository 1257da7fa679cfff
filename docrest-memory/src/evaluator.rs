//! Query expression evaluation for in-memory document filtering.
//!
//! Field names are dotted paths: `imdb.rating` reads `rating` inside the embedded `imdb`
//! sub-document, `cast.0.name` reads into the first element of an array.

use std::{collections::HashMap, cmp::Ordering};
use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};

use docrest_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Integers and floats are normalized to f64, so a stored `Int32` year equals a filter's
/// `Int64` year.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }
}

fn any_equal<'a>(haystack: &[Comparable<'a>], needle: &Comparable<'a>) -> bool {
    haystack.iter().any(|item| item == needle)
}

/// `AnyOf` semantics: either side may be a single value or an array.
fn any_of<'a>(field: Comparable<'a>, value: Comparable<'a>) -> bool {
    match (field, value) {
        (Comparable::Array(array), Comparable::Array(values)) => values
            .iter()
            .any(|val| any_equal(&array, val)),
        (Comparable::Array(array), single_value) => any_equal(&array, &single_value),
        (single_value, Comparable::Array(values)) => any_equal(&values, &single_value),
        _ => false,
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.document, field) else {
            // A missing field only satisfies the negative operators.
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf));
        };

        match op {
            FieldOp::Eq => Ok(match Comparable::from(field_value) {
                Comparable::Array(array) if value.as_array().is_none() => {
                    any_equal(&array, &Comparable::from(value))
                }
                left => left == Comparable::from(value),
            }),
            FieldOp::Ne => Ok(Comparable::from(field_value) != Comparable::from(value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                Ok(match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                })
            },
            FieldOp::Contains | FieldOp::NotContains => {
                let contains = match (Comparable::from(field_value), Comparable::from(value)) {
                    (Comparable::Array(array), needle) => any_equal(&array, &needle),
                    (Comparable::String(left), Comparable::String(right)) => left.contains(right),
                    _ => false,
                };

                Ok(contains == matches!(op, FieldOp::Contains))
            },
            FieldOp::StartsWith => match (Comparable::from(field_value), Comparable::from(value)) {
                (Comparable::String(left), Comparable::String(right)) => Ok(left.starts_with(right)),
                _ => Ok(false),
            },
            FieldOp::EndsWith => match (Comparable::from(field_value), Comparable::from(value)) {
                (Comparable::String(left), Comparable::String(right)) => Ok(left.ends_with(right)),
                _ => Ok(false),
            },
            FieldOp::AnyOf => Ok(any_of(Comparable::from(field_value), Comparable::from(value))),
            FieldOp::NoneOf => Ok(!any_of(Comparable::from(field_value), Comparable::from(value))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docrest_core::query::Filter;

    fn matches(document: &BsonDocument, expr: Expr) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&expr)
            .unwrap()
    }

    #[test]
    fn numbers_compare_across_widths() {
        let movie = doc! { "title": "Spider Man 3", "year": 2009_i32 };

        assert!(matches(&movie, Filter::eq("year", 2009_i64)));
        assert!(matches(&movie, Filter::gte("year", 2009.0)));
        assert!(!matches(&movie, Filter::lt("year", 2009)));
    }

    #[test]
    fn dotted_paths_reach_embedded_values() {
        let movie = doc! {
            "title": "Movie with embedded doc",
            "imdb": { "imdb_id": "12340mov", "rating": 4.2, "votes": 7 },
            "cast": [{ "name": "Ada" }, { "name": "Grace" }],
        };

        assert!(matches(&movie, Filter::eq("imdb.imdb_id", "12340mov")));
        assert!(matches(&movie, Filter::gt("imdb.rating", 4)));
        assert!(matches(&movie, Filter::eq("cast.1.name", "Grace")));
        assert!(!matches(&movie, Filter::exists("imdb.missing")));
    }

    #[test]
    fn missing_fields_match_only_negations() {
        let movie = doc! { "title": "x" };

        assert!(!matches(&movie, Filter::eq("year", 2009)));
        assert!(matches(&movie, Filter::ne("year", 2009)));
        assert!(matches(&movie, Filter::not_exists("year")));
    }

    #[test]
    fn keys_match_by_membership() {
        let first = ObjectId::new();
        let todo = doc! { "_id": first, "title": "todo" };

        assert!(matches(&todo, Filter::any_of("_id", vec![Bson::ObjectId(ObjectId::new()), Bson::ObjectId(first)])));
        assert!(matches(&todo, Filter::none_of("_id", vec![Bson::Int64(1)])));
    }
}
