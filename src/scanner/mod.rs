use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::paths::{self, DirectoryKey};
use crate::types::{DirectoryDto, PhotoDto, PhotoMetadata};

pub mod iptc;
pub mod metadata;

pub use metadata::{ExifMetadataExtractor, MetadataExtractor};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("directory not found: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedPhoto {
    pub name: String,
    pub metadata: PhotoMetadata,
}

/// In-memory result of reading one directory from disk.
///
/// `directories` holds the direct children only. Their photo lists are
/// previews (`is_partial`) and their own subdirectories are not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedDirectory {
    pub name: String,
    pub path: String,
    pub last_modified: i64,
    pub last_scanned: i64,
    pub is_partial: bool,
    pub photos: Vec<ScannedPhoto>,
    pub directories: Vec<ScannedDirectory>,
}

impl ScannedDirectory {
    pub fn key(&self) -> DirectoryKey {
        DirectoryKey { name: self.name.clone(), path: self.path.clone() }
    }

    pub fn full_path(&self) -> String {
        self.key().full_path()
    }

    /// Shapes the scan into the listing DTO.
    ///
    /// Child previews are ordered by creation date and capped at `preview_size`.
    pub fn to_dto(&self, preview_size: usize) -> DirectoryDto {
        let photos = self
            .photos
            .iter()
            .map(|p| PhotoDto::new(None, p.name.clone(), p.metadata.clone()))
            .collect();
        let directories = self
            .directories
            .iter()
            .map(|child| {
                let mut preview: Vec<&ScannedPhoto> = child.photos.iter().collect();
                preview.sort_by_key(|p| p.metadata.creation_date);
                preview.truncate(preview_size);
                DirectoryDto {
                    id: None,
                    name: child.name.clone(),
                    path: child.path.clone(),
                    last_modified: child.last_modified,
                    last_scanned: None,
                    is_partial: true,
                    photos: preview
                        .into_iter()
                        .map(|p| PhotoDto::new(None, p.name.clone(), p.metadata.clone()))
                        .collect(),
                    directories: Vec::new(),
                }
            })
            .collect();
        DirectoryDto {
            id: None,
            name: self.name.clone(),
            path: self.path.clone(),
            last_modified: self.last_modified,
            last_scanned: Some(self.last_scanned),
            is_partial: self.is_partial,
            photos,
            directories,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
    pub preview_size: usize,
}

impl ScanOptions {
    pub fn from_config(cfg: &crate::config::AppConfig) -> Self {
        Self {
            extensions: cfg
                .images
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            excludes: cfg.images.excludes.clone(),
            preview_size: cfg.indexing.folder_preview_size,
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            excludes: Vec::new(),
            preview_size: 2,
        }
    }
}

/// Reads directories below a fixed image root.
#[derive(Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
    options: ScanOptions,
    excludes: GlobSet,
    extractor: Arc<dyn MetadataExtractor>,
}

struct Level {
    photos: Vec<ScannedPhoto>,
    subdirs: Vec<(String, PathBuf)>,
}

impl DirectoryScanner {
    pub fn new(
        root: impl Into<PathBuf>,
        options: ScanOptions,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, ScanError> {
        let excludes = build_globset(&options.excludes)?;
        Ok(Self { root: root.into(), options, excludes, extractor })
    }

    pub fn with_exif(root: impl Into<PathBuf>, options: ScanOptions) -> Result<Self, ScanError> {
        Self::new(root, options, Arc::new(ExifMetadataExtractor))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a normalized full path against the image root.
    pub fn resolve(&self, full: &str) -> PathBuf {
        if full.is_empty() {
            self.root.clone()
        } else {
            self.root.join(full)
        }
    }

    /// Reads `relative` and its direct children from disk.
    pub fn scan(&self, relative: &str) -> Result<ScannedDirectory, ScanError> {
        let full = paths::normalize(relative)?;
        let abs = self.resolve(&full);
        let shown = if full.is_empty() { "/".to_string() } else { full.clone() };

        let meta = fs::metadata(&abs).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(shown.clone()),
            _ => ScanError::Io { path: shown.clone(), source: e },
        })?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(shown));
        }

        let last_scanned = chrono::Utc::now().timestamp_millis();
        let level = self.read_level(&full, &abs, None)?;

        let mut directories = Vec::with_capacity(level.subdirs.len());
        for (name, child_abs) in level.subdirs {
            let child_full = paths::join(&full, &name);
            // An unreadable child stays listed without previews so a sync keeps its catalog rows
            let child_last_modified = match fs::metadata(&child_abs) {
                Ok(m) => last_modified_millis(&m),
                Err(e) => {
                    tracing::warn!("Cannot stat directory {}: {}", child_full, e);
                    0
                }
            };
            let previews = match self.read_level(&child_full, &child_abs, Some(self.options.preview_size)) {
                Ok(l) => l.photos,
                Err(e) => {
                    tracing::warn!("Cannot read previews of {}: {}", child_full, e);
                    Vec::new()
                }
            };
            directories.push(ScannedDirectory {
                name,
                path: paths::child_path_of(&full),
                last_modified: child_last_modified,
                last_scanned,
                is_partial: true,
                photos: previews,
                directories: Vec::new(),
            });
        }

        let key = DirectoryKey::from_full_path(&full);
        tracing::debug!(
            "Scanned {}: {} photos, {} subdirectories",
            shown,
            level.photos.len(),
            directories.len()
        );
        Ok(ScannedDirectory {
            name: key.name,
            path: key.path,
            last_modified: last_modified_millis(&meta),
            last_scanned,
            is_partial: false,
            photos: level.photos,
            directories,
        })
    }

    fn read_level(&self, full: &str, abs: &Path, photo_limit: Option<usize>) -> Result<Level, ScanError> {
        let mut level = Level { photos: Vec::new(), subdirs: Vec::new() };
        let walker = WalkDir::new(abs)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                // a skipped entry would read as deleted on the next sync
                Err(e) => {
                    let path = match e.path() {
                        Some(p) if e.depth() > 0 => p.display().to_string(),
                        _ => full.to_string(),
                    };
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop"));
                    return Err(ScanError::Io { path, source });
                }
            };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!("Skipping entry with a non UTF-8 name in {}: {:?}", full, entry.file_name());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let rel = paths::join(full, &name);
            if matches_excludes(&rel, &self.excludes) {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if photo_limit.is_none() {
                    level.subdirs.push((name, entry.into_path()));
                }
            } else if file_type.is_file() && self.is_image(&name) {
                if photo_limit.is_some_and(|limit| level.photos.len() >= limit) {
                    continue;
                }
                let md = entry.metadata().map_err(|e| ScanError::Io {
                    path: rel.clone(),
                    source: e.into_io_error().unwrap_or_else(|| std::io::Error::other("metadata unavailable")),
                })?;
                let metadata = self.extractor.extract(entry.path(), &md);
                level.photos.push(ScannedPhoto { name, metadata });
            }
        }
        Ok(level)
    }

    fn is_image(&self, name: &str) -> bool {
        match Path::new(name).extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_lowercase();
                self.options.extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

/// Max of change and modify time in epoch millis.
pub fn last_modified_millis(md: &fs::Metadata) -> i64 {
    let mtime = md
        .modified()
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
        .unwrap_or(0);
    mtime.max(change_time_millis(md).unwrap_or(0))
}

#[cfg(unix)]
fn change_time_millis(md: &fs::Metadata) -> Option<i64> {
    use std::os::unix::fs::MetadataExt;
    Some(md.ctime() * 1000 + md.ctime_nsec() / 1_000_000)
}

#[cfg(not(unix))]
fn change_time_millis(_md: &fs::Metadata) -> Option<i64> {
    None
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        if p.trim().is_empty() {
            continue;
        }
        // Same separator normalization as the relative paths we match against
        let norm = p.trim().replace('\\', "/");
        b.add(Glob::new(&norm)?);
    }
    b.build()
}

fn matches_excludes(rel: &str, set: &GlobSet) -> bool {
    !set.is_empty() && set.is_match(rel)
}
