//! Files kept in the binary-object area without a parent record.
//!
//! `POST /files` stores the `file` part of a multipart form under its filename, and
//! `GET /files/{filename}` serves the latest upload with that name. Any stored attachment,
//! posters included, can also be read by reference with `GET /attachments/{id}`.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use bson::oid::ObjectId;
use serde_json::{Value, json};

use docrest_core::error::DocumentStoreError;

use crate::{
    error::{ApiResult, StoreResultExt},
    routes::attachments::{UploadForm, attachment_response},
    state::AppState,
};

/// `POST /files`: answers 201 with the new file's reference.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    const OP: &str = "save_file";

    let upload = UploadForm::read(OP, multipart).await?.upload(OP)?;
    let filename = upload.filename.clone();
    let length = upload.data.len();

    let id = state
        .store
        .attachments()
        .put(upload)
        .await
        .during(OP)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "_id": id.to_hex(), "filename": filename, "length": length })),
    ))
}

/// `GET /files/{filename}`
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Response> {
    let attachment = state
        .store
        .attachments()
        .get_by_name(&filename)
        .await
        .during("get_file")?;

    Ok(attachment_response(attachment))
}

/// `GET /attachments/{id}`: a reference that is not an ObjectId names no attachment.
pub async fn by_reference(State(state): State<AppState>, Path(reference): Path<String>) -> ApiResult<Response> {
    const OP: &str = "get_attachment";

    let missing = || DocumentStoreError::AttachmentNotFound(reference.clone());
    let id = ObjectId::parse_str(&reference)
        .map_err(|_| missing())
        .during(OP)?;
    let attachment = state
        .store
        .attachments()
        .get(id)
        .await
        .during(OP)?
        .ok_or_else(missing)
        .during(OP)?;

    Ok(attachment_response(attachment))
}
