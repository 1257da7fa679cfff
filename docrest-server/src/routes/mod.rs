//! Request handlers, one module per resource.

pub mod attachments;
pub mod directors;
pub mod files;
pub mod records;
pub mod todos;

use axum::{Json, extract::rejection::JsonRejection, http::Uri};
use serde_json::Value;

use docrest_core::{
    document::{Document, Stored},
    error::DocumentStoreResult,
};

use crate::error::{ApiError, ApiResult};

/// Unwraps a JSON body, answering 400 when it could not be read.
pub(crate) fn json_body(operation: &'static str, body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(operation, rejection.body_text()))
}

pub(crate) fn render_all<D: Document>(items: &[Stored<D>]) -> DocumentStoreResult<Value> {
    items
        .iter()
        .map(Stored::to_json)
        .collect::<DocumentStoreResult<Vec<_>>>()
        .map(Value::Array)
}

pub(crate) async fn unknown_route(uri: Uri) -> ApiError {
    ApiError {
        operation: "route",
        status: axum::http::StatusCode::NOT_FOUND,
        kind: "not_found",
        message: format!("no route for {}", uri.path()),
        field: None,
    }
}
