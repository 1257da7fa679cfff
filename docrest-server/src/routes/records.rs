//! Typed movie records.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;

use docrest_core::{
    document::{DocumentExt, Patch, RecordId},
    page::{Page, PaginationParams},
    query::{Filter, coerce_path_value},
};

use crate::{
    error::{ApiResult, StoreResultExt},
    models::{BY_FIELD, Imdb, Movie, reject_poster_write},
    routes::{json_body, render_all},
    state::AppState,
};

/// `GET /records`: every `field=value` pair of the query string must match.
pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<Value>> {
    let movies = state
        .store
        .typed_collection::<Movie>()
        .find(Filter::from_pairs(pairs))
        .await
        .during("list")?;

    Ok(Json(render_all(&movies).during("list")?))
}

/// `GET /records/paginate?page=&limit=`
pub async fn paginate(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<Value>>> {
    let params = PaginationParams::from_raw(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
    );

    let page = state
        .store
        .typed_collection::<Movie>()
        .paginate(params, None)
        .await
        .during("paginate")?
        .try_map(|movie| movie.to_json())
        .during("paginate")?;

    Ok(Json(page))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let movie = state
        .store
        .typed_collection::<Movie>()
        .find_by_id(&RecordId::parse(&id))
        .await
        .during("get")?;

    Ok(Json(movie.to_json().during("get")?))
}

pub async fn find_by_field(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> ApiResult<Json<Value>> {
    let movies = state
        .store
        .typed_collection::<Movie>()
        .find_by_field(BY_FIELD, coerce_path_value(&value))
        .await
        .during("get_by_field")?;

    Ok(Json(render_all(&movies).during("get_by_field")?))
}

pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body("create", body)?;
    reject_poster_write(&body).during("create")?;
    let movie = Movie::from_json(body).during("create")?;
    let stored = state
        .store
        .typed_collection::<Movie>()
        .insert_one(movie)
        .await
        .during("create")?;

    Ok((StatusCode::CREATED, Json(stored.to_json().during("create")?)))
}

/// `POST /records/embedded`: like `create`, with an imdb listing unless the body brings one.
pub async fn create_embedded(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body("create_embedded", body)?;
    reject_poster_write(&body).during("create_embedded")?;
    let mut movie = Movie::from_json(body).during("create_embedded")?;
    movie.imdb.get_or_insert_with(Imdb::placeholder);

    let stored = state
        .store
        .typed_collection::<Movie>()
        .insert_one(movie)
        .await
        .during("create_embedded")?;

    Ok((StatusCode::CREATED, Json(stored.to_json().during("create_embedded")?)))
}

/// `PUT /records/{id}`: answers with the key of the updated record.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RecordId>> {
    let body = json_body("update", body)?;
    reject_poster_write(&body).during("update")?;
    let patch = Patch::from_json(body).during("update")?;
    let id = state
        .store
        .typed_collection::<Movie>()
        .update_one(&RecordId::parse(&id), patch)
        .await
        .during("update")?;

    Ok(Json(id))
}

/// `PUT /records/by-field/{value}`: answers with the keys matched before the update.
pub async fn update_by_field(
    State(state): State<AppState>,
    Path(value): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Vec<RecordId>>> {
    let body = json_body("update_many", body)?;
    reject_poster_write(&body).during("update_many")?;
    let patch = Patch::from_json(body).during("update_many")?;
    let ids = state
        .store
        .typed_collection::<Movie>()
        .update_many(Filter::eq(BY_FIELD, coerce_path_value(&value)), patch)
        .await
        .during("update_many")?;

    Ok(Json(ids))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<RecordId>> {
    let id = state
        .store
        .typed_collection::<Movie>()
        .delete_one(&RecordId::parse(&id))
        .await
        .during("delete")?;

    Ok(Json(id))
}

pub async fn delete_by_field(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> ApiResult<Json<Vec<RecordId>>> {
    let ids = state
        .store
        .typed_collection::<Movie>()
        .delete_many(Filter::eq(BY_FIELD, coerce_path_value(&value)))
        .await
        .during("delete_many")?;

    Ok(Json(ids))
}
