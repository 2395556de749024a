use std::time::Duration;

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Ready once the catalog answers a count within five seconds.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.gallery.catalog();
    match tokio::time::timeout(READY_TIMEOUT, catalog.directory_count()).await {
        Ok(Ok(directories)) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "catalogDirectories": directories,
                "backgroundJobs": state.gallery.jobs().in_flight(),
            })),
        ),
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "reason": e.to_string() })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "reason": "catalog timeout" })),
        ),
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.get_snapshot().to_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let indexing = &state.config.indexing;
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "target": format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
        },
        "indexing": {
            "sensitivity": indexing.re_indexing_sensitivity,
            "cachedFolderTimeoutMs": indexing.cached_folder_timeout_ms,
            "folderPreviewSize": indexing.folder_preview_size,
            "workers": state.gallery.dispatcher().strategy(),
        }
    }))
}
