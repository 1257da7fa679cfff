//! Dynamic director records: any set of fields is accepted.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;

use docrest_core::document::{Record, RecordId, json_to_fields};

use crate::{
    error::{ApiResult, StoreResultExt},
    models::DIRECTORS,
    routes::json_body,
    state::AppState,
};

pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let fields = json_to_fields(json_body("create_director", body)?).during("create_director")?;
    let record = state
        .store
        .collection(DIRECTORS)
        .insert_one(fields)
        .await
        .during("create_director")?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Record>> {
    let record = state
        .store
        .collection(DIRECTORS)
        .find_by_id(&RecordId::parse(&id))
        .await
        .during("get_director")?;

    Ok(Json(record))
}
