use std::path::Path as FsPath;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use slideshow_protocol::{IMAGE_ROUTE, LIST_ROUTE, decode_image_id};
use tracing::{debug, error, info, warn};

use crate::lists::{ListError, ListStore};

type HandlerError = (StatusCode, String);

#[derive(Clone)]
struct AppState {
    store: Arc<ListStore>,
}

pub fn router(store: Arc<ListStore>) -> Router {
    Router::new()
        .route(LIST_ROUTE, get(get_list))
        .route(IMAGE_ROUTE, get(get_image))
        .with_state(AppState { store })
}

async fn get_list(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<String>>, HandlerError> {
    let show = state.store.get_or_load(&key).await.map_err(list_error)?;
    Ok(Json(show.entries().to_vec()))
}

async fn get_image(
    State(state): State<AppState>,
    Path((key, image_id)): Path<(String, String)>,
) -> Result<Response, HandlerError> {
    let show = state.store.get_or_load(&key).await.map_err(list_error)?;
    let entry = decode_image_id(&image_id).map_err(|err| {
        debug!(key, image_id, error = %err, "undecodable image id");
        not_found()
    })?;
    if !show.contains(&entry) {
        warn!(key, entry, "image not in slideshow list");
        return Err(not_found());
    }
    let path = state.store.resolve_image(&entry).await.ok_or_else(|| {
        info!(key, entry, "image not found");
        not_found()
    })?;

    let content_type = image_content_type(&path).ok_or_else(|| {
        warn!(key, path = %path.display(), "not an image file");
        (
            StatusCode::BAD_REQUEST,
            format!("invalid image file: {entry}"),
        )
    })?;
    let bytes = tokio::fs::read(&path).await.map_err(|err| {
        error!(path = %path.display(), error = %err, "failed to read image");
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to read image".to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn image_content_type(path: &FsPath) -> Option<&'static str> {
    image::ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

fn not_found() -> HandlerError {
    (StatusCode::NOT_FOUND, "image not found".to_string())
}

fn list_error(err: ListError) -> HandlerError {
    match err {
        ListError::UnknownKey(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ListError::Unreadable { .. } => {
            error!(error = %err, "failed to load slideshow list");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
