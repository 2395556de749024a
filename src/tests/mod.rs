//! Integration and unit tests for the Bilderwald library.
//!
//! ## Test Modules
//!
//! - **scanner_tests**: Reading directories, previews, excludes
//! - **worker_tests**: In-process and pooled task execution
//! - **catalog_tests**: Diff & merge of scans into the catalog
//! - **gallery_tests**: Staleness policy and background syncs
//! - **api_tests**: HTTP endpoints
//! - **error_tests**: Error handling and validation
//! - **config_tests**: Configuration loading and validation
//! - **db_tests**: Schema and constraints
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test gallery_tests
//! ```

pub mod db_tests;
pub mod error_tests;
pub mod worker_tests;

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::catalog::Catalog;
use crate::config::{IndexingConfig, ThreadingConfig};
use crate::gallery::{GalleryCache, ManualClock};
use crate::metrics::Metrics;
use crate::scanner::{DirectoryScanner, ScanOptions, ScannedDirectory, ScannedPhoto};
use crate::types::{PhotoMetadata, ReIndexingSensitivity};
use crate::worker::Dispatcher;

/// Fresh catalog database in its own temp dir; keep the dir alive.
pub(crate) async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
    let pool = crate::db::connect(&url, 4).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    (pool, dir)
}

pub(crate) fn write_image(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::new(8, 6).save(path).unwrap();
}

/// Image root with two photos, `2019/` holding three and an empty `2020/`.
pub(crate) fn sample_library() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_image(&dir.path().join("a.png"));
    write_image(&dir.path().join("b.png"));
    write_image(&dir.path().join("2019/x.png"));
    write_image(&dir.path().join("2019/y.png"));
    write_image(&dir.path().join("2019/z.png"));
    std::fs::create_dir_all(dir.path().join("2020")).unwrap();
    dir
}

pub(crate) struct TestGallery {
    pub gallery: GalleryCache,
    pub clock: Arc<ManualClock>,
    pub metrics: Metrics,
    pub pool: SqlitePool,
    pub library: TempDir,
    pub _db: TempDir,
    pub thumbnails: TempDir,
}

pub(crate) const START_MILLIS: i64 = 1_700_000_000_000;

pub(crate) async fn test_gallery(
    sensitivity: ReIndexingSensitivity,
    timeout_ms: i64,
    threaded: bool,
) -> TestGallery {
    let library = sample_library();
    let (pool, db_dir) = test_pool().await;
    let thumbnails = TempDir::new().unwrap();
    let metrics = Metrics::new();

    let scanner = DirectoryScanner::with_exif(library.path(), ScanOptions::default()).unwrap();
    let threading = ThreadingConfig { enable: threaded, workers: Some(2), queue_capacity: 8 };
    let dispatcher = Dispatcher::from_config(&threading, scanner, metrics.clone()).unwrap();
    let indexing = IndexingConfig {
        re_indexing_sensitivity: sensitivity,
        cached_folder_timeout_ms: timeout_ms,
        folder_preview_size: 2,
    };
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let gallery = GalleryCache::new(
        Catalog::new(pool.clone()),
        dispatcher,
        library.path(),
        thumbnails.path(),
        indexing,
        metrics.clone(),
    )
    .with_clock(clock.clone());

    TestGallery { gallery, clock, metrics, pool, library, _db: db_dir, thumbnails }
}

pub(crate) fn photo(name: &str, creation_date: i64, keywords: &[&str]) -> ScannedPhoto {
    ScannedPhoto {
        name: name.to_string(),
        metadata: PhotoMetadata {
            creation_date,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            file_size: 1024,
            ..PhotoMetadata::default()
        },
    }
}

pub(crate) fn scanned(
    full_path: &str,
    last_scanned: i64,
    photos: Vec<ScannedPhoto>,
    directories: Vec<ScannedDirectory>,
) -> ScannedDirectory {
    let key = crate::paths::DirectoryKey::from_full_path(full_path);
    ScannedDirectory {
        name: key.name,
        path: key.path,
        last_modified: 1_000,
        last_scanned,
        is_partial: false,
        photos,
        directories,
    }
}

/// A direct child as the scanner reports it: previews only, never scanned.
pub(crate) fn child(parent_full: &str, name: &str, photos: Vec<ScannedPhoto>) -> ScannedDirectory {
    ScannedDirectory {
        name: name.to_string(),
        path: crate::paths::child_path_of(parent_full),
        last_modified: 2_000,
        last_scanned: 0,
        is_partial: true,
        photos,
        directories: Vec::new(),
    }
}
