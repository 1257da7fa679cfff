//! Filter expressions and queries.
//!
//! Handlers build filters with [`Filter`]; backends translate them with a [`QueryVisitor`]
//! (the memory backend evaluates them, the MongoDB backend turns them into query documents).
//!
//! ```ignore
//! use docrest_core::query::{Filter, Query};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("year", 2009).and(Filter::exists("rated")))
//!     .offset(10)
//!     .limit(5)
//!     .build();
//! ```
//!
//! Field names may be dotted paths (`imdb.rating`) to reach into embedded sub-records.

use bson::{Bson, oid::ObjectId};

use crate::{
    document::{ID_FIELD, RecordId},
    error::DocumentStoreError,
};

/// Field comparison operators.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String contains substring, or array contains element.
    Contains,
    /// Negation of [`FieldOp::Contains`].
    NotContains,
    StartsWith,
    EndsWith,
    /// Field (or one of its elements) equals one of the given values.
    AnyOf,
    /// Negation of [`FieldOp::AnyOf`].
    NoneOf,
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All sub-expressions must match. An empty list matches everything.
    And(Vec<Expr>),
    /// At least one sub-expression must match.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`true`) or absent (`false`).
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines with another expression; flattens into an existing `And`.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines with another expression; flattens into an existing `Or`.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query: optional filter and window. Results keep the store's natural order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// A query with only a filter.
    pub fn filtered(filter: Option<Expr>) -> Self {
        Query { filter, ..Query::default() }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Constructors for filter expressions.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }

    /// Matches records whose key is one of `ids`.
    pub fn id_in<'a>(ids: impl IntoIterator<Item = &'a RecordId>) -> Expr {
        Filter::any_of(
            ID_FIELD,
            Bson::Array(ids.into_iter().map(RecordId::to_bson).collect()),
        )
    }

    /// One condition per `(field, raw value)` pair, all of which must hold.
    ///
    /// A raw value matches any of its [`path_value_candidates`], so `?rated=5` finds a stored
    /// integer 5 as well as the string `"5"`. Returns `None` for an empty set of pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Option<Expr>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let exprs = pairs
            .into_iter()
            .map(|(field, value)| {
                let mut candidates = path_value_candidates(value.as_ref());
                if candidates.len() == 1 {
                    Filter::eq(field, candidates.remove(0))
                } else {
                    Filter::any_of(field, Bson::Array(candidates))
                }
            })
            .collect::<Vec<_>>();

        match exprs.len() {
            0 => None,
            1 => exprs.into_iter().next(),
            _ => Some(Expr::And(exprs)),
        }
    }
}

/// Every value a raw query-string value may stand for: the [`coerce_path_value`] reading first,
/// then the raw string, then an ObjectId when the text is one.
pub fn path_value_candidates(raw: &str) -> Vec<Bson> {
    let mut candidates = match coerce_path_value(raw) {
        coerced @ Bson::String(_) => vec![coerced],
        coerced => vec![coerced, Bson::String(raw.to_string())],
    };
    if let Ok(oid) = ObjectId::parse_str(raw) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates
}

/// Turns a raw string from a URL into the value it most likely denotes.
///
/// Tries integer, then float, then boolean, and falls back to the string itself, so `"2009"`
/// matches a stored integer year.
pub fn coerce_path_value(raw: &str) -> Bson {
    if let Ok(value) = raw.parse::<i64>() {
        return i32::try_from(value)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(value));
    }
    if let Ok(value) = raw.parse::<f64>() {
        if value.is_finite() {
            return Bson::Double(value);
        }
    }
    match raw {
        "true" => Bson::Boolean(true),
        "false" => Bson::Boolean(false),
        _ => Bson::String(raw.to_string()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter only when one is given.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression. Backends implement this to evaluate or translate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
