use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

/// Opens (creating if needed) the catalog database.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = sqlx::query("PRAGMA cache_size=-65536;").execute(&mut *conn).await; // ~64MB page cache
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Foreign keys carry the delete cascades - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    // directories: one row per directory below the image root
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS directories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            last_modified INTEGER NOT NULL,
            last_scanned INTEGER NULL,
            parent_id INTEGER NULL,
            FOREIGN KEY(parent_id) REFERENCES directories(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // photos: owned by exactly one directory
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS photos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            directory_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            creation_date INTEGER NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            file_size INTEGER NOT NULL,
            keywords TEXT NOT NULL DEFAULT '[]',
            camera_data TEXT NOT NULL DEFAULT '{}',
            position_data TEXT NOT NULL DEFAULT '{}',
            FOREIGN KEY(directory_id) REFERENCES directories(id) ON DELETE CASCADE
        )"#,
    )
    .execute(pool)
    .await?;

    // Uniqueness is part of the catalog contract, so these must exist
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_directories_name_path ON directories(name, path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_photos_directory_name ON photos(directory_id, name)")
        .execute(pool)
        .await?;

    let indexes = [
        ("idx_directories_parent", "CREATE INDEX IF NOT EXISTS idx_directories_parent ON directories(parent_id)"),
        ("idx_directories_path", "CREATE INDEX IF NOT EXISTS idx_directories_path ON directories(path)"),
        (
            "idx_photos_directory_created",
            "CREATE INDEX IF NOT EXISTS idx_photos_directory_created ON photos(directory_id, creation_date)",
        ),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }

    Ok(())
}
