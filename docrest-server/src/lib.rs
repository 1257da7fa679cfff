//! HTTP surface of docrest.
//!
//! Routes map HTTP intents onto the collections of [`docrest_core`]:
//!
//! - `/records` - typed `movies` documents with an embedded `imdb` record and a `poster` attachment
//! - `/directors` - dynamic records with no schema
//! - `/todos` - raw records with caller-chosen keys, bulk insert, replace and find-and-modify
//! - `/files` and `/attachments` - files in the binary-object area, by name or by reference
//!
//! Every failure is answered with a JSON body naming the operation, see [`error::ApiError`].

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

pub use state::AppState;

/// Largest request body accepted, attachments included.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the HTTP API router over the given store.
pub fn build_router(state: AppState) -> Router {
    use routes::{attachments, directors, files, records, todos};

    Router::new()
        .route("/records", get(records::list).post(records::create))
        .route("/records/paginate", get(records::paginate))
        .route("/records/embedded", post(records::create_embedded))
        .route(
            "/records/by-field/{value}",
            get(records::find_by_field)
                .put(records::update_by_field)
                .delete(records::delete_by_field),
        )
        .route("/records/with-attachment", post(attachments::create))
        .route(
            "/records/with-attachment/{id}",
            get(attachments::download)
                .put(attachments::attach)
                .delete(attachments::delete),
        )
        .route(
            "/records/{id}",
            get(records::get)
                .put(records::update)
                .delete(records::delete),
        )
        .route("/directors", post(directors::create))
        .route("/directors/{id}", get(directors::get))
        .route(
            "/todos",
            get(todos::list)
                .put(todos::update_many)
                .delete(todos::delete_many),
        )
        .route("/todos/bulk", post(todos::bulk_create))
        .route(
            "/todos/{id}",
            get(todos::get)
                .put(todos::update)
                .delete(todos::delete),
        )
        .route("/todos/{id}/replace", put(todos::replace))
        .route("/todos/{id}/find-and-update", put(todos::find_and_update))
        .route("/todos/{id}/find-and-replace", put(todos::find_and_replace))
        .route("/todos/{id}/find-and-delete", delete(todos::find_and_delete))
        .route("/files", post(files::upload))
        .route("/files/{filename}", get(files::download))
        .route("/attachments/{id}", get(files::by_reference))
        .fallback(routes::unknown_route)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
