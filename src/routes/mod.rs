//! HTTP route handlers for the Bilderwald API.
//!
//! - `gallery`: directory listings, thumbnails and the catalog event stream
//! - `health`: health, readiness, metrics and version endpoints

pub mod gallery;
pub mod health;

use axum::{routing::get, Router};

use crate::state::AppState;

/// All API routes, without the transport layers `main` adds on top.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/gallery/content", get(gallery::root_content))
        .route("/api/gallery/content/{*path}", get(gallery::content))
        .route("/api/gallery/thumbnail/{size}/{*path}", get(gallery::thumbnail))
        .route("/api/gallery/events", get(gallery::events))
        .with_state(state)
}
