//! Query translation from filter expressions to MongoDB query syntax.
//!
//! String operators become anchored regular expressions over the escaped input, so a title like
//! `Spider Man (2)` is matched literally.

use bson::{Document, Bson, doc};

use docrest_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};

use crate::sanitizer::ValueSanitizer;


/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; no filter selects everything.
    pub(crate) fn translate(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if "\\^$.|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn as_list(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        other => Bson::Array(vec![other.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` only applies to operator expressions; `$nor` negates a whole clause.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let path = ValueSanitizer::sanitize_path(field);

        Ok(doc! {
            path: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => match value {
                Bson::String(s) => doc! { "$regex": escape_regex(s) },
                other => doc! { "$eq": other },
            },
            FieldOp::NotContains => match value {
                Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                other => doc! { "$ne": other },
            },
            FieldOp::StartsWith => match value {
                Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                _ => return Err(DocumentStoreError::invalid_field(field, "starts-with needs a string value")),
            },
            FieldOp::EndsWith => match value {
                Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                _ => return Err(DocumentStoreError::invalid_field(field, "ends-with needs a string value")),
            },
            FieldOp::AnyOf => doc! { "$in": as_list(value) },
            FieldOp::NoneOf => doc! { "$nin": as_list(value) },
        };

        let path = ValueSanitizer::sanitize_path(field);

        Ok(doc! {
            path: condition,
        })
    }
}
