//! Raw todo records with caller-chosen keys.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use docrest_core::{
    bulk::BulkMode,
    collection::ReplaceReport,
    document::{Patch, Record, RecordId, json_to_fields},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter},
};

use crate::{
    error::{ApiError, ApiResult, StoreResultExt},
    models::TODOS,
    routes::json_body,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct BulkParams {
    /// `stop` (default) or `continue`
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceParams {
    #[serde(default)]
    pub upsert: bool,
}

/// The query-string filter of a bulk write. Touching every todo takes an explicit filter.
fn required_filter(operation: &'static str, pairs: Vec<(String, String)>) -> ApiResult<Expr> {
    Filter::from_pairs(pairs)
        .ok_or_else(|| ApiError::bad_request(operation, "a field=value filter is required"))
}

/// `GET /todos`, filtered by the `field=value` pairs of the query string.
pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<Record>>> {
    let todos = state
        .store
        .collection(TODOS)
        .find(Filter::from_pairs(pairs))
        .await
        .during("list_todos")?;

    Ok(Json(todos))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Record>> {
    let todo = state
        .store
        .collection(TODOS)
        .find_by_id(&RecordId::parse(&id))
        .await
        .during("get_todo")?;

    Ok(Json(todo))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RecordId>> {
    let patch = Patch::from_json(json_body("update_todo", body)?).during("update_todo")?;
    let id = state
        .store
        .collection(TODOS)
        .update_one(&RecordId::parse(&id), patch)
        .await
        .during("update_todo")?;

    Ok(Json(id))
}

/// `PUT /todos?field=value`: answers with the keys matched before the update.
pub async fn update_many(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Vec<RecordId>>> {
    const OP: &str = "update_todos";

    let filter = required_filter(OP, pairs)?;
    let patch = Patch::from_json(json_body(OP, body)?).during(OP)?;
    let ids = state
        .store
        .collection(TODOS)
        .update_many(filter, patch)
        .await
        .during(OP)?;

    Ok(Json(ids))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<RecordId>> {
    let id = state
        .store
        .collection(TODOS)
        .delete_one(&RecordId::parse(&id))
        .await
        .during("delete_todo")?;

    Ok(Json(id))
}

/// `DELETE /todos?field=value`
pub async fn delete_many(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Vec<RecordId>>> {
    let ids = state
        .store
        .collection(TODOS)
        .delete_many(required_filter("delete_todos", pairs)?)
        .await
        .during("delete_todos")?;

    Ok(Json(ids))
}

/// `PUT /todos/{id}/find-and-update`: answers with the todo as it was before the patch.
pub async fn find_and_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Record>> {
    const OP: &str = "find_and_update";

    let patch = Patch::from_json(json_body(OP, body)?).during(OP)?;
    let before = state
        .store
        .collection(TODOS)
        .find_one_and_update(&RecordId::parse(&id), patch)
        .await
        .during(OP)?;

    Ok(Json(before))
}

/// `PUT /todos/{id}/find-and-replace`: answers with the todo as it was before.
pub async fn find_and_replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Record>> {
    const OP: &str = "find_and_replace";

    let fields = json_to_fields(json_body(OP, body)?).during(OP)?;
    let before = state
        .store
        .collection(TODOS)
        .find_one_and_replace(&RecordId::parse(&id), fields)
        .await
        .during(OP)?;

    Ok(Json(before))
}

/// `DELETE /todos/{id}/find-and-delete`: answers with the deleted todo.
pub async fn find_and_delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Record>> {
    let before = state
        .store
        .collection(TODOS)
        .find_one_and_delete(&RecordId::parse(&id))
        .await
        .during("find_and_delete")?;

    Ok(Json(before))
}

/// `POST /todos/bulk?mode=stop|continue` with a JSON array of records.
///
/// 201 when every record went in. Otherwise the report comes back with 409 in stop mode and 200
/// in continue mode, where skipping duplicates is the expected outcome.
pub async fn bulk_create(
    State(state): State<AppState>,
    Query(params): Query<BulkParams>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    const OP: &str = "bulk_create";

    let mode = params
        .mode
        .as_deref()
        .map(str::parse::<BulkMode>)
        .transpose()
        .map_err(|message| ApiError::bad_request(OP, message))?
        .unwrap_or_default();

    let inputs = match json_body(OP, body)? {
        Value::Array(items) => items
            .into_iter()
            .map(json_to_fields)
            .collect::<DocumentStoreResult<Vec<_>>>()
            .during(OP)?,
        other => {
            return Err(ApiError::from_store(
                OP,
                DocumentStoreError::Validation {
                    field: None,
                    message: format!("expected a JSON array of records, got {other}"),
                },
            ));
        }
    };

    let report = state
        .store
        .collection(TODOS)
        .insert_many(inputs, mode)
        .await
        .during(OP)?;

    let status = match (report.is_complete(), mode) {
        (true, _) => StatusCode::CREATED,
        (false, BulkMode::StopOnDuplicate) => StatusCode::CONFLICT,
        (false, BulkMode::ContinueOnDuplicate) => StatusCode::OK,
    };

    Ok((status, Json(report.to_json())))
}

/// `PUT /todos/{id}/replace?upsert=true|false`
pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReplaceParams>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ReplaceReport>> {
    let fields = json_to_fields(json_body("replace", body)?).during("replace")?;
    let report = state
        .store
        .collection(TODOS)
        .replace_one(&RecordId::parse(&id), fields, params.upsert)
        .await
        .during("replace")?;

    Ok(Json(report))
}
