//! Movies with a poster attachment.
//!
//! Uploads are multipart forms: a `file` part with the bytes and an optional `metadata` part
//! holding the movie as JSON.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use docrest_core::{
    attachment::{Attachment, AttachmentUpload},
    document::{DocumentExt, RecordId},
    error::DocumentStoreError,
};

use crate::{
    error::{ApiError, ApiResult, StoreResultExt},
    models::{Movie, POSTER_FIELD, reject_poster_write},
    state::AppState,
};

#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    upload: Option<AttachmentUpload>,
    metadata: Option<Value>,
}

impl UploadForm {
    pub(crate) async fn read(
        operation: &'static str,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> ApiResult<Self> {
        let mut multipart = multipart.map_err(|rejection| ApiError::bad_request(operation, rejection.to_string()))?;
        let malformed = |err: axum::extract::multipart::MultipartError| ApiError::bad_request(operation, err.to_string());
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().map(str::to_string);

            match name.as_deref() {
                Some("file") => {
                    let filename = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(malformed)?;

                    form.upload = Some(AttachmentUpload::new(filename, content_type, data.to_vec()));
                }
                Some("metadata") => {
                    let text = field.text().await.map_err(malformed)?;
                    let metadata = serde_json::from_str(&text)
                        .map_err(|err| ApiError::bad_request(operation, format!("metadata is not JSON: {err}")))?;

                    form.metadata = Some(metadata);
                }
                other => debug!(operation, field = ?other, "ignoring multipart field"),
            }
        }

        Ok(form)
    }

    pub(crate) fn upload(&mut self, operation: &'static str) -> ApiResult<AttachmentUpload> {
        self.upload
            .take()
            .ok_or_else(|| DocumentStoreError::invalid_field("file", "a file part is required"))
            .during(operation)
    }
}

/// `POST /records/with-attachment`
pub async fn create(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    const OP: &str = "create_with_attachment";

    let mut form = UploadForm::read(OP, multipart).await?;
    let upload = form.upload(OP)?;
    let movie = match form.metadata {
        Some(metadata) => {
            reject_poster_write(&metadata).during(OP)?;
            Movie::from_json(metadata).during(OP)?
        }
        None => Movie::poster_placeholder(),
    };

    let stored = state
        .store
        .typed_collection::<Movie>()
        .insert_with_attachment(movie, POSTER_FIELD, upload)
        .await
        .during(OP)?;

    Ok((StatusCode::CREATED, Json(stored.to_json().during(OP)?)))
}

/// `PUT /records/with-attachment/{id}`: attaches a poster to an existing movie.
pub async fn attach(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    const OP: &str = "attach";

    let upload = UploadForm::read(OP, multipart).await?.upload(OP)?;
    let stored = state
        .store
        .typed_collection::<Movie>()
        .store_attachment(&RecordId::parse(&id), POSTER_FIELD, upload)
        .await
        .during(OP)?;

    Ok(Json(stored.to_json().during(OP)?))
}

/// `GET /records/with-attachment/{id}`: the poster bytes.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let attachment = state
        .store
        .typed_collection::<Movie>()
        .read_attachment(&RecordId::parse(&id), POSTER_FIELD)
        .await
        .during("read_attachment")?;

    Ok(attachment_response(attachment))
}

/// The attachment bytes, with its content type and a download filename.
pub(crate) fn attachment_response(attachment: Attachment) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe(&attachment.info.filename)
    );

    (
        [
            (header::CONTENT_TYPE, attachment.info.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        attachment.data,
    )
        .into_response()
}

/// `DELETE /records/with-attachment/{id}`: removes the poster, then the movie.
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state
        .store
        .typed_collection::<Movie>()
        .delete_with_attachment(&RecordId::parse(&id), POSTER_FIELD)
        .await
        .during("delete_with_attachment")?;

    Ok(StatusCode::NO_CONTENT)
}

/// Keeps printable ASCII, so the filename always forms a valid header value.
fn header_safe(filename: &str) -> String {
    filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ' '..='~' => ch,
            _ => '_',
        })
        .collect()
}
