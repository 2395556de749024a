use std::collections::HashMap;

use crate::paths::DirectoryKey;
use crate::types::{DirectoryDto, ImageSize, PhotoDto, PhotoMetadata};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DirectoryRecord {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub last_modified: i64,
    pub last_scanned: Option<i64>,
    pub parent_id: Option<i64>,
}

impl DirectoryRecord {
    pub fn key(&self) -> DirectoryKey {
        DirectoryKey { name: self.name.clone(), path: self.path.clone() }
    }

    /// Discovered through its parent but never listed itself.
    pub fn is_stub(&self) -> bool {
        self.last_scanned.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: i64,
    pub directory_id: i64,
    pub name: String,
    pub metadata: PhotoMetadata,
}

impl PhotoRecord {
    fn to_dto(&self) -> PhotoDto {
        PhotoDto::new(Some(self.id), self.name.clone(), self.metadata.clone())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PhotoRow {
    pub id: i64,
    pub directory_id: i64,
    pub name: String,
    pub creation_date: i64,
    pub width: i64,
    pub height: i64,
    pub file_size: i64,
    pub keywords: String,
    pub camera_data: String,
    pub position_data: String,
}

impl From<PhotoRow> for PhotoRecord {
    fn from(row: PhotoRow) -> Self {
        // Unparseable JSON reads as empty, so the next sync rewrites it
        let keywords = serde_json::from_str(&row.keywords).unwrap_or_else(|e| {
            tracing::warn!("Photo {} has unreadable keywords: {}", row.id, e);
            Vec::new()
        });
        let camera_data = serde_json::from_str(&row.camera_data).unwrap_or_else(|e| {
            tracing::warn!("Photo {} has unreadable camera data: {}", row.id, e);
            Default::default()
        });
        let position_data = serde_json::from_str(&row.position_data).unwrap_or_else(|e| {
            tracing::warn!("Photo {} has unreadable position data: {}", row.id, e);
            Default::default()
        });
        PhotoRecord {
            id: row.id,
            directory_id: row.directory_id,
            name: row.name,
            metadata: PhotoMetadata {
                creation_date: row.creation_date,
                size: ImageSize {
                    width: u32::try_from(row.width).unwrap_or(0),
                    height: u32::try_from(row.height).unwrap_or(0),
                },
                file_size: u64::try_from(row.file_size).unwrap_or(0),
                keywords,
                camera_data,
                position_data,
            },
        }
    }
}

/// Id-addressed view of one directory, its direct children and their photos.
///
/// `photos` of the root is the full list; children carry previews only.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    pub root: i64,
    pub directories: HashMap<i64, DirectoryRecord>,
    /// Direct children of `root`, in name order.
    pub children: Vec<i64>,
    pub photos: HashMap<i64, Vec<PhotoRecord>>,
}

impl CatalogSnapshot {
    pub fn root(&self) -> &DirectoryRecord {
        // root is always inserted alongside its id
        &self.directories[&self.root]
    }

    pub fn photos_of(&self, directory_id: i64) -> &[PhotoRecord] {
        self.photos.get(&directory_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Builds the forward-only listing DTO.
    pub fn to_dto(&self) -> DirectoryDto {
        let root = self.root();
        let directories = self
            .children
            .iter()
            .filter_map(|id| self.directories.get(id))
            .map(|child| DirectoryDto {
                id: Some(child.id),
                name: child.name.clone(),
                path: child.path.clone(),
                last_modified: child.last_modified,
                last_scanned: child.last_scanned,
                is_partial: true,
                photos: self.photos_of(child.id).iter().map(PhotoRecord::to_dto).collect(),
                directories: Vec::new(),
            })
            .collect();
        DirectoryDto {
            id: Some(root.id),
            name: root.name.clone(),
            path: root.path.clone(),
            last_modified: root.last_modified,
            last_scanned: root.last_scanned,
            is_partial: false,
            photos: self.photos_of(root.id).iter().map(PhotoRecord::to_dto).collect(),
            directories,
        }
    }
}
