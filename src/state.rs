use std::sync::Arc;

use crate::config::AppConfig;
use crate::gallery::GalleryCache;
use crate::metrics::Metrics;

/// Handler state; cloned per request, everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Listing policy, catalog and worker dispatch.
    pub gallery: Arc<GalleryCache>,
    pub config: Arc<AppConfig>,
    /// Counters shared with the gallery and the dispatcher.
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(gallery: GalleryCache, config: AppConfig, metrics: Metrics) -> Self {
        Self { gallery: Arc::new(gallery), config: Arc::new(config), metrics }
    }
}
