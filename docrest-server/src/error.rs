//! Error responses.
//!
//! Every failed request is answered with
//! `{ "operation": .., "error": .., "message": .., "field": .. }`, `field` only when one is known.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{error, warn};

use docrest_core::error::{DocumentStoreError, DocumentStoreResult};

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request, tagged with the operation that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub operation: &'static str,
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub field: Option<String>,
}

impl ApiError {
    pub fn from_store(operation: &'static str, err: DocumentStoreError) -> Self {
        let status = match &err {
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::AttachmentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DocumentStoreError::Validation { .. } | DocumentStoreError::InvalidDocument(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DocumentStoreError::DuplicateKey { .. } => StatusCode::CONFLICT,
            DocumentStoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let field = match &err {
            DocumentStoreError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        Self {
            operation,
            status,
            kind: err.kind(),
            message: err.to_string(),
            field,
        }
    }

    /// A request the server could not even read: malformed JSON, multipart or query values.
    pub fn bad_request(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
            field: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "operation": self.operation,
            "error": self.kind,
            "message": self.message,
        });
        if let Some(field) = &self.field {
            body["field"] = Value::String(field.clone());
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(operation = self.operation, kind = self.kind, message = %self.message, "request failed");
        } else {
            warn!(operation = self.operation, kind = self.kind, message = %self.message, "request rejected");
        }

        (self.status, Json(self.to_json())).into_response()
    }
}

/// Tags store results with the operation they belong to.
pub trait StoreResultExt<T> {
    fn during(self, operation: &'static str) -> ApiResult<T>;
}

impl<T> StoreResultExt<T> for DocumentStoreResult<T> {
    fn during(self, operation: &'static str) -> ApiResult<T> {
        self.map_err(|err| ApiError::from_store(operation, err))
    }
}
