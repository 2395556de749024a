use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::{
    error::AppResult,
    state::AppState,
    types::{ListDirectoryQuery, Listing},
};

pub async fn root_content(
    State(state): State<AppState>,
    Query(query): Query<ListDirectoryQuery>,
) -> AppResult<Response> {
    list(&state, "", query).await
}

pub async fn content(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ListDirectoryQuery>,
) -> AppResult<Response> {
    list(&state, &path, query).await
}

async fn list(state: &AppState, path: &str, query: ListDirectoryQuery) -> AppResult<Response> {
    let listing = state
        .gallery
        .list_directory(path, query.known_last_modified, query.known_last_scanned)
        .await?;
    Ok(match listing {
        Listing::Directory(dto) => Json(dto).into_response(),
        Listing::NoChange => StatusCode::NOT_MODIFIED.into_response(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ThumbnailQuery {
    #[serde(default)]
    pub square: bool,
}

pub async fn thumbnail(
    State(state): State<AppState>,
    Path((size, path)): Path<(u32, String)>,
    Query(query): Query<ThumbnailQuery>,
) -> AppResult<Response> {
    let file = state.gallery.render_thumbnail(&path, size, query.square).await?;
    let bytes = tokio::fs::read(&file).await?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok((
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response())
}

// Live catalog updates; lagged receivers just skip what they missed
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.gallery.jobs().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|res| res.ok()).map(|ev| {
        let data = serde_json::to_string(&ev)
            .unwrap_or_else(|_| json!({"type":"warning","message":"serialization error"}).to_string());
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10)).text("keep-alive"))
}
