//! Persisted directory and photo catalog.
//!
//! A sync merges one scan into the tables inside a single transaction:
//! the scanned directory row is upserted, direct children are matched by
//! name (new ones become stubs, vanished ones are deleted with their
//! subtree) and photos are diffed by name.

pub mod locks;
pub mod model;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{QueryBuilder, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use crate::paths::{self, DirectoryKey};
use crate::scanner::{ScannedDirectory, ScannedPhoto};
use crate::types::SyncStats;

pub use locks::PathLocks;
pub use model::{CatalogSnapshot, DirectoryRecord, PhotoRecord};
use model::PhotoRow;

// Respect SQLite variable limit (commonly 999)
const SQLITE_MAX_VARS: usize = 999;
const PHOTO_BINDS_PER_ROW: usize = 9; // directory_id, name, creation_date, width, height, file_size, keywords, camera_data, position_data

const DIRECTORY_COLUMNS: &str = "id, name, path, last_modified, last_scanned, parent_id";
const PHOTO_COLUMNS: &str =
    "id, directory_id, name, creation_date, width, height, file_size, keywords, camera_data, position_data";

#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
    locks: PathLocks,
    // SQLite allows one writer; serializing here keeps deferred
    // transactions from failing their read-to-write upgrade.
    writer: Arc<Mutex<()>>,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, locks: PathLocks::new(), writer: Arc::new(Mutex::new(())) }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn find_directory(&self, key: &DirectoryKey) -> sqlx::Result<Option<DirectoryRecord>> {
        let mut conn = self.pool.acquire().await?;
        select_directory(&mut conn, key).await
    }

    /// Loads a directory with its photos and direct children, each child
    /// carrying its `preview_size` oldest photos.
    pub async fn load_directory(
        &self,
        full_path: &str,
        preview_size: usize,
    ) -> sqlx::Result<Option<CatalogSnapshot>> {
        let key = DirectoryKey::from_full_path(full_path);
        // one read transaction so the listing is consistent
        let mut tx = self.pool.begin().await?;
        let Some(root) = select_directory(&mut tx, &key).await? else {
            return Ok(None);
        };

        let children: Vec<DirectoryRecord> = sqlx::query_as(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories WHERE parent_id = ?1 ORDER BY name"
        ))
        .bind(root.id)
        .fetch_all(&mut *tx)
        .await?;

        let mut photos = HashMap::new();
        photos.insert(root.id, select_photos(&mut tx, root.id).await?);
        for child in &children {
            let preview: Vec<PhotoRow> = sqlx::query_as(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos WHERE directory_id = ?1 \
                 ORDER BY creation_date ASC, name ASC LIMIT ?2"
            ))
            .bind(child.id)
            .bind(preview_size as i64)
            .fetch_all(&mut *tx)
            .await?;
            photos.insert(child.id, preview.into_iter().map(PhotoRecord::from).collect());
        }
        tx.commit().await?;

        let root_id = root.id;
        let child_ids = children.iter().map(|c| c.id).collect();
        let mut directories: HashMap<i64, DirectoryRecord> =
            children.into_iter().map(|c| (c.id, c)).collect();
        directories.insert(root_id, root);

        Ok(Some(CatalogSnapshot { root: root_id, directories, children: child_ids, photos }))
    }

    /// Merges a scan into the catalog. Either everything commits or nothing does.
    pub async fn sync(&self, scanned: &ScannedDirectory) -> sqlx::Result<SyncStats> {
        let full = scanned.full_path();
        let _path_guard = self.locks.lock(&full).await;
        let _writer = self.writer.lock().await;

        let mut tx = self.pool.begin().await?;
        let stats = merge(&mut tx, scanned).await?;
        tx.commit().await?;

        tracing::debug!(path = %full, ?stats, "catalog sync committed");
        Ok(stats)
    }

    pub async fn directory_count(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM directories").fetch_one(&self.pool).await
    }

    pub async fn photo_count(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM photos").fetch_one(&self.pool).await
    }
}

async fn select_directory(
    conn: &mut SqliteConnection,
    key: &DirectoryKey,
) -> sqlx::Result<Option<DirectoryRecord>> {
    sqlx::query_as(&format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE name = ?1 AND path = ?2"))
        .bind(&key.name)
        .bind(&key.path)
        .fetch_optional(&mut *conn)
        .await
}

async fn select_photos(conn: &mut SqliteConnection, directory_id: i64) -> sqlx::Result<Vec<PhotoRecord>> {
    let rows: Vec<PhotoRow> =
        sqlx::query_as(&format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE directory_id = ?1 ORDER BY name"))
            .bind(directory_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows.into_iter().map(PhotoRecord::from).collect())
}

async fn merge(conn: &mut SqliteConnection, scanned: &ScannedDirectory) -> sqlx::Result<SyncStats> {
    let key = scanned.key();
    let mut stats = SyncStats::default();

    let root_id = match select_directory(conn, &key).await? {
        Some(existing) => {
            if existing.last_scanned.is_some_and(|ls| ls > scanned.last_scanned) {
                tracing::debug!(path = %key.full_path(), "skipping sync of an older scan");
                return Ok(SyncStats { skipped: true, ..SyncStats::default() });
            }
            if existing.last_modified != scanned.last_modified
                || existing.last_scanned != Some(scanned.last_scanned)
            {
                sqlx::query("UPDATE directories SET last_modified = ?1, last_scanned = ?2 WHERE id = ?3")
                    .bind(scanned.last_modified)
                    .bind(scanned.last_scanned)
                    .bind(existing.id)
                    .execute(&mut *conn)
                    .await?;
                stats.root_updated = true;
            }
            if existing.parent_id.is_none() {
                if let Some(parent_id) = parent_id_of(conn, &key).await? {
                    attach(conn, existing.id, parent_id).await?;
                    stats.directories_attached += 1;
                }
            }
            existing.id
        }
        None => {
            let parent_id = parent_id_of(conn, &key).await?;
            let id = insert_directory(conn, &key, scanned.last_modified, Some(scanned.last_scanned), parent_id)
                .await?;
            stats.root_inserted = true;
            id
        }
    };

    // Orphans with the child path are children whose parent row came later
    let child_path = paths::child_path_of(&key.full_path());
    let persisted: Vec<DirectoryRecord> = sqlx::query_as(&format!(
        "SELECT {DIRECTORY_COLUMNS} FROM directories \
         WHERE (parent_id = ?1 OR (parent_id IS NULL AND path = ?2)) AND id != ?1"
    ))
    .bind(root_id)
    .bind(&child_path)
    .fetch_all(&mut *conn)
    .await?;
    let mut unmatched: HashMap<String, DirectoryRecord> =
        persisted.into_iter().map(|d| (d.name.clone(), d)).collect();

    for child in &scanned.directories {
        match unmatched.remove(&child.name) {
            Some(existing) => {
                if existing.parent_id != Some(root_id) {
                    attach(conn, existing.id, root_id).await?;
                    stats.directories_attached += 1;
                }
            }
            None => {
                let child_key = child.key();
                let id = insert_directory(conn, &child_key, child.last_modified, None, Some(root_id)).await?;
                let previews: Vec<&ScannedPhoto> = child.photos.iter().collect();
                stats.photos_inserted += insert_photos(conn, id, &previews).await?;
                stats.directories_inserted += 1;
            }
        }
    }

    let gone: Vec<i64> = unmatched.into_values().map(|d| d.id).collect();
    // subtrees and photos follow through ON DELETE CASCADE
    stats.directories_deleted = delete_by_id(conn, "directories", &gone).await?;

    let mut known: HashMap<String, PhotoRecord> = select_photos(conn, root_id)
        .await?
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect();
    let mut fresh = Vec::new();
    for photo in &scanned.photos {
        match known.remove(&photo.name) {
            Some(existing) => {
                if existing.metadata.differs_from(&photo.metadata) {
                    update_photo(conn, existing.id, photo).await?;
                    stats.photos_updated += 1;
                }
            }
            None => fresh.push(photo),
        }
    }
    stats.photos_inserted += insert_photos(conn, root_id, &fresh).await?;

    let stale: Vec<i64> = known.into_values().map(|p| p.id).collect();
    stats.photos_deleted = delete_by_id(conn, "photos", &stale).await?;

    Ok(stats)
}

async fn parent_id_of(conn: &mut SqliteConnection, key: &DirectoryKey) -> sqlx::Result<Option<i64>> {
    match key.parent() {
        Some(parent) => Ok(select_directory(conn, &parent).await?.map(|d| d.id)),
        None => Ok(None),
    }
}

async fn insert_directory(
    conn: &mut SqliteConnection,
    key: &DirectoryKey,
    last_modified: i64,
    last_scanned: Option<i64>,
    parent_id: Option<i64>,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO directories (name, path, last_modified, last_scanned, parent_id) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&key.name)
    .bind(&key.path)
    .bind(last_modified)
    .bind(last_scanned)
    .bind(parent_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn attach(conn: &mut SqliteConnection, id: i64, parent_id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE directories SET parent_id = ?1 WHERE id = ?2")
        .bind(parent_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

struct EncodedPhoto<'a> {
    photo: &'a ScannedPhoto,
    keywords: String,
    camera_data: String,
    position_data: String,
}

impl<'a> EncodedPhoto<'a> {
    fn new(photo: &'a ScannedPhoto) -> sqlx::Result<Self> {
        let m = &photo.metadata;
        Ok(Self {
            photo,
            keywords: to_json(&m.keywords)?,
            camera_data: to_json(&m.camera_data)?,
            position_data: to_json(&m.position_data)?,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> sqlx::Result<String> {
    serde_json::to_string(value)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to encode metadata column: {}", e)))
}

async fn insert_photos(
    conn: &mut SqliteConnection,
    directory_id: i64,
    photos: &[&ScannedPhoto],
) -> sqlx::Result<u64> {
    if photos.is_empty() {
        return Ok(0);
    }
    let encoded = photos.iter().map(|p| EncodedPhoto::new(p)).collect::<sqlx::Result<Vec<_>>>()?;

    let mut inserted = 0;
    for chunk in encoded.chunks(SQLITE_MAX_VARS / PHOTO_BINDS_PER_ROW) {
        let mut qb = QueryBuilder::new(
            "INSERT INTO photos (directory_id, name, creation_date, width, height, file_size, keywords, camera_data, position_data) ",
        );
        qb.push_values(chunk, |mut b, e| {
            let m = &e.photo.metadata;
            b.push_bind(directory_id)
                .push_bind(&e.photo.name)
                .push_bind(m.creation_date)
                .push_bind(i64::from(m.size.width))
                .push_bind(i64::from(m.size.height))
                .push_bind(m.file_size as i64)
                .push_bind(&e.keywords)
                .push_bind(&e.camera_data)
                .push_bind(&e.position_data);
        });
        inserted += qb.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

async fn update_photo(conn: &mut SqliteConnection, id: i64, photo: &ScannedPhoto) -> sqlx::Result<()> {
    let e = EncodedPhoto::new(photo)?;
    let m = &photo.metadata;
    sqlx::query(
        "UPDATE photos SET creation_date = ?1, width = ?2, height = ?3, file_size = ?4, \
         keywords = ?5, camera_data = ?6, position_data = ?7 WHERE id = ?8",
    )
    .bind(m.creation_date)
    .bind(i64::from(m.size.width))
    .bind(i64::from(m.size.height))
    .bind(m.file_size as i64)
    .bind(&e.keywords)
    .bind(&e.camera_data)
    .bind(&e.position_data)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn delete_by_id(conn: &mut SqliteConnection, table: &'static str, ids: &[i64]) -> sqlx::Result<u64> {
    let mut deleted = 0;
    for chunk in ids.chunks(SQLITE_MAX_VARS) {
        let mut qb = QueryBuilder::new(format!("DELETE FROM {table} WHERE id IN ("));
        let mut list = qb.separated(", ");
        for id in chunk {
            list.push_bind(*id);
        }
        list.push_unseparated(")");
        deleted += qb.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}
