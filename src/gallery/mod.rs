//! Directory listings backed by the catalog.
//!
//! Each listing decides, from filesystem timestamps, the caller's
//! validators and the configured sensitivity, whether to answer
//! "no change", serve catalog data, or rescan. Persisting a fresh scan
//! never holds up the response; it runs as a background job.

pub mod clock;
pub mod jobs;

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::IndexingConfig;
use crate::error::{validation, AppError, AppResult};
use crate::metrics::Metrics;
use crate::paths;
use crate::scanner::{last_modified_millis, ScanError, ScannedDirectory};
use crate::types::{IndexEvent, Listing, ReIndexingSensitivity};
use crate::worker::{Dispatcher, RenderInput, RendererKind};

pub use clock::{Clock, ManualClock, SystemClock};
pub use jobs::BackgroundJobs;

pub struct GalleryCache {
    catalog: Catalog,
    dispatcher: Dispatcher,
    images_root: PathBuf,
    thumbnail_folder: PathBuf,
    indexing: IndexingConfig,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    jobs: BackgroundJobs,
}

impl GalleryCache {
    pub fn new(
        catalog: Catalog,
        dispatcher: Dispatcher,
        images_root: impl Into<PathBuf>,
        thumbnail_folder: impl Into<PathBuf>,
        indexing: IndexingConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            images_root: images_root.into(),
            thumbnail_folder: thumbnail_folder.into(),
            indexing,
            clock: Arc::new(SystemClock),
            metrics,
            jobs: BackgroundJobs::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn jobs(&self) -> &BackgroundJobs {
        &self.jobs
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Lists one directory.
    ///
    /// `known_last_modified`/`known_last_scanned` are the values the caller
    /// got from a previous listing; when they still hold, the answer may be
    /// [`Listing::NoChange`].
    pub async fn list_directory(
        &self,
        raw_path: &str,
        known_last_modified: Option<i64>,
        known_last_scanned: Option<i64>,
    ) -> AppResult<Listing> {
        validation::validate_path(raw_path)?;
        let full = paths::normalize(raw_path)?;
        let fs_last_modified = self.stat_directory(&full).await?;
        self.metrics.inc_listings_served();

        let preview_size = self.indexing.folder_preview_size;
        let Some(snapshot) = self.catalog.load_directory(&full, preview_size).await? else {
            tracing::debug!(path = %full, "cold miss, scanning");
            self.metrics.inc_cold_misses();
            return self.scan_and_persist(&full).await;
        };

        let root = snapshot.root();
        let Some(last_scanned) = root.last_scanned else {
            tracing::debug!(path = %full, "stub directory, seeding");
            self.metrics.inc_stub_seeds();
            return self.scan_and_persist(&full).await;
        };

        if fs_last_modified != root.last_modified {
            tracing::debug!(
                path = %full,
                persisted = root.last_modified,
                on_disk = fs_last_modified,
                "directory changed on disk, rescanning"
            );
            self.metrics.inc_stale_rescans();
            return self.scan_and_persist(&full).await;
        }

        let sensitivity = self.indexing.re_indexing_sensitivity;
        let timeout = self.indexing.cached_folder_timeout_ms;
        let now = self.clock.now_millis();

        if known_last_modified == Some(root.last_modified) && known_last_scanned == Some(last_scanned) {
            let unchanged = match sensitivity {
                ReIndexingSensitivity::Low => true,
                ReIndexingSensitivity::Medium => now - last_scanned <= timeout,
                ReIndexingSensitivity::High => false,
            };
            if unchanged {
                tracing::debug!(path = %full, "caller is up to date");
                self.metrics.inc_no_change_hits();
                return Ok(Listing::NoChange);
            }
        }

        let expired = now - last_scanned > timeout && sensitivity >= ReIndexingSensitivity::Medium;
        if expired || sensitivity == ReIndexingSensitivity::High {
            self.schedule_refresh(full.clone());
        }
        Ok(Listing::Directory(snapshot.to_dto()))
    }

    /// Returns the cached thumbnail for a photo, rendering it first if needed.
    pub async fn render_thumbnail(&self, photo_path: &str, size: u32, square: bool) -> AppResult<PathBuf> {
        validation::validate_thumbnail_size(size)?;
        validation::validate_path(photo_path)?;
        let full = paths::normalize(photo_path)?;
        if full.is_empty() {
            return Err(AppError::BadRequest("Photo path is required".to_string()));
        }

        let source = self.images_root.join(&full);
        let source_meta = match tokio::fs::metadata(&source).await {
            Ok(md) if md.is_file() => md,
            Ok(_) => return Err(AppError::NotFound(format!("Photo not found: {}", full))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Photo not found: {}", full)));
            }
            Err(e) => return Err(e.into()),
        };

        let target = self.thumbnail_folder.join(thumbnail_file_name(&full, size, square));
        if let Ok(cached) = tokio::fs::metadata(&target).await {
            let fresh = match (cached.modified(), source_meta.modified()) {
                (Ok(rendered), Ok(changed)) => rendered >= changed,
                _ => true,
            };
            if fresh {
                return Ok(target);
            }
        }

        let input = RenderInput { source, target, size, make_square: square };
        let written = self.dispatcher.render_thumbnail(input, RendererKind::Quality).await?;
        tracing::debug!(photo = %full, size, "thumbnail rendered");
        Ok(written)
    }

    async fn stat_directory(&self, full: &str) -> AppResult<i64> {
        let shown = if full.is_empty() { "/" } else { full };
        let abs = if full.is_empty() { self.images_root.clone() } else { self.images_root.join(full) };
        let md = tokio::fs::metadata(&abs).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(shown.to_string()),
            _ => ScanError::Io { path: shown.to_string(), source: e },
        })?;
        if !md.is_dir() {
            return Err(ScanError::NotADirectory(shown.to_string()).into());
        }
        Ok(last_modified_millis(&md))
    }

    /// Foreground scan; the result is returned now and persisted later.
    async fn scan_and_persist(&self, full: &str) -> AppResult<Listing> {
        let scanned = scan_stamped(&self.dispatcher, self.clock.as_ref(), full).await?;
        let dto = scanned.to_dto(self.indexing.folder_preview_size);
        tracing::info!(
            path = %full,
            photos = scanned.photos.len(),
            directories = scanned.directories.len(),
            "directory scanned"
        );
        self.spawn_sync(scanned);
        Ok(Listing::Directory(dto))
    }

    fn spawn_sync(&self, scanned: ScannedDirectory) {
        let sync = SyncJob { catalog: self.catalog.clone(), metrics: self.metrics.clone(), jobs: self.jobs.clone() };
        self.jobs.spawn(async move { sync.persist(scanned).await });
    }

    fn schedule_refresh(&self, full: String) {
        tracing::debug!(path = %full, "scheduling background refresh");
        self.metrics.inc_lazy_refreshes();
        self.jobs.publish(IndexEvent::RefreshScheduled { path: full.clone() });

        let sync = SyncJob { catalog: self.catalog.clone(), metrics: self.metrics.clone(), jobs: self.jobs.clone() };
        let dispatcher = self.dispatcher.clone();
        let clock = self.clock.clone();
        self.jobs.spawn(async move {
            match scan_stamped(&dispatcher, clock.as_ref(), &full).await {
                Ok(scanned) => sync.persist(scanned).await,
                Err(e) => {
                    tracing::warn!("Background rescan of {} failed: {}", full, e);
                    sync.metrics.inc_syncs_failed();
                    sync.jobs.publish(IndexEvent::SyncFailed { path: full, message: e.to_string() });
                }
            }
        });
    }
}

/// Scans through the dispatcher, stamping the clock reading taken before dispatch.
async fn scan_stamped(dispatcher: &Dispatcher, clock: &dyn Clock, full: &str) -> AppResult<ScannedDirectory> {
    let stamp = clock.now_millis();
    let mut scanned = dispatcher.scan_directory(full).await?;
    scanned.last_scanned = stamp;
    Ok(scanned)
}

struct SyncJob {
    catalog: Catalog,
    metrics: Metrics,
    jobs: BackgroundJobs,
}

impl SyncJob {
    async fn persist(self, scanned: ScannedDirectory) {
        let path = scanned.full_path();
        match self.catalog.sync(&scanned).await {
            Ok(stats) => {
                self.metrics.inc_syncs_completed();
                self.metrics.add_rows_written(stats.rows_written());
                if stats.skipped {
                    tracing::debug!(path = %path, "newer scan already persisted");
                } else {
                    tracing::info!(path = %path, rows = stats.rows_written(), "catalog synced");
                }
                self.jobs.publish(IndexEvent::SyncCompleted { path, stats });
            }
            Err(e) => {
                tracing::error!("Catalog sync of {} failed: {}", path, e);
                self.metrics.inc_syncs_failed();
                self.jobs.publish(IndexEvent::SyncFailed { path, message: e.to_string() });
            }
        }
    }
}

/// Stable cache file name for a photo's thumbnail.
pub fn thumbnail_file_name(full_path: &str, size: u32, square: bool) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, full_path.as_bytes());
    if square {
        format!("{}_{}_sq.jpg", id, size)
    } else {
        format!("{}_{}.jpg", id, size)
    }
}
