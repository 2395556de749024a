use serde::{Deserialize, Serialize};

/// How eagerly previously scanned directories are re-read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReIndexingSensitivity {
    Low,
    Medium,
    High,
}

impl Default for ReIndexingSensitivity {
    fn default() -> Self {
        ReIndexingSensitivity::Low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraData {
    #[serde(rename = "ISO")]
    pub iso: Option<u32>,
    pub model: Option<String>,
    pub make: Option<String>,
    pub f_stop: Option<f64>,
    pub exposure: Option<f64>,
    pub focal_length: Option<f64>,
    pub lens: Option<String>,
}

impl CameraData {
    pub fn is_empty(&self) -> bool {
        *self == CameraData::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsData {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionData {
    #[serde(rename = "GPSData")]
    pub gps_data: Option<GpsData>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl PositionData {
    pub fn is_empty(&self) -> bool {
        *self == PositionData::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoMetadata {
    /// Capture time in epoch millis.
    pub creation_date: i64,
    pub size: ImageSize,
    pub file_size: u64,
    pub keywords: Vec<String>,
    pub camera_data: CameraData,
    pub position_data: PositionData,
}

impl PhotoMetadata {
    /// True when the fields the catalog keeps in sync differ.
    ///
    /// Creation date and file size are written on insert only.
    pub fn differs_from(&self, other: &PhotoMetadata) -> bool {
        self.keywords != other.keywords
            || self.camera_data != other.camera_data
            || self.position_data != other.position_data
            || self.size != other.size
    }
}

// DTOs handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDto {
    pub id: Option<i64>,
    pub name: String,
    pub metadata: PhotoMetadata,
    pub ready_thumbnails: Vec<u32>,
    pub ready_icon: bool,
}

impl PhotoDto {
    pub fn new(id: Option<i64>, name: String, metadata: PhotoMetadata) -> Self {
        Self { id, name, metadata, ready_thumbnails: Vec::new(), ready_icon: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDto {
    pub id: Option<i64>,
    pub name: String,
    pub path: String,
    pub last_modified: i64,
    pub last_scanned: Option<i64>,
    pub is_partial: bool,
    pub photos: Vec<PhotoDto>,
    pub directories: Vec<DirectoryDto>,
}

/// Outcome of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Directory(DirectoryDto),
    /// The caller's validators still describe the catalog; nothing to send.
    NoChange,
}

impl Listing {
    pub fn into_directory(self) -> Option<DirectoryDto> {
        match self {
            Listing::Directory(dir) => Some(dir),
            Listing::NoChange => None,
        }
    }
}

/// Counts of catalog rows touched by one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub root_inserted: bool,
    pub root_updated: bool,
    pub directories_inserted: u64,
    pub directories_attached: u64,
    pub directories_deleted: u64,
    pub photos_inserted: u64,
    pub photos_updated: u64,
    pub photos_deleted: u64,
    /// A newer scan of the same directory was already persisted.
    pub skipped: bool,
}

impl SyncStats {
    pub fn rows_written(&self) -> u64 {
        u64::from(self.root_inserted)
            + u64::from(self.root_updated)
            + self.directories_inserted
            + self.directories_attached
            + self.directories_deleted
            + self.photos_inserted
            + self.photos_updated
            + self.photos_deleted
    }

    pub fn is_noop(&self) -> bool {
        self.rows_written() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexEvent {
    RefreshScheduled {
        path: String,
    },
    SyncCompleted {
        path: String,
        stats: SyncStats,
    },
    SyncFailed {
        path: String,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDirectoryQuery {
    pub known_last_modified: Option<i64>,
    pub known_last_scanned: Option<i64>,
}
