#[cfg(test)]
mod tests {
    use crate::tests::test_pool;

    #[tokio::test]
    async fn test_init_db() {
        let (pool, _dir) = test_pool().await;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(tables.contains(&"directories".to_string()));
        assert!(tables.contains(&"photos".to_string()));

        let indexes: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(indexes.contains(&"idx_directories_name_path".to_string()));
        assert!(indexes.contains(&"idx_photos_directory_name".to_string()));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let (pool, _dir) = test_pool().await;
        crate::db::init_db(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_key_is_unique() {
        let (pool, _dir) = test_pool().await;
        let insert = "INSERT INTO directories (name, path, last_modified) VALUES ('2019', '', 1)";
        sqlx::query(insert).execute(&pool).await.unwrap();
        assert!(sqlx::query(insert).execute(&pool).await.is_err());
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let (pool, _dir) = test_pool().await;

        let parent = sqlx::query("INSERT INTO directories (name, path, last_modified, last_scanned) VALUES ('a', '', 1, 1)")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
        let child = sqlx::query("INSERT INTO directories (name, path, last_modified, parent_id) VALUES ('b', 'a/', 1, ?1)")
            .bind(parent)
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query(
            "INSERT INTO photos (directory_id, name, creation_date, width, height, file_size) VALUES (?1, 'p.jpg', 0, 1, 1, 1)",
        )
        .bind(child)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM directories WHERE id = ?1").bind(parent).execute(&pool).await.unwrap();

        let dirs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM directories").fetch_one(&pool).await.unwrap();
        let photos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos").fetch_one(&pool).await.unwrap();
        assert_eq!(dirs, 0);
        assert_eq!(photos, 0);
    }

    #[tokio::test]
    async fn test_json_columns_default_to_empty() {
        let (pool, _dir) = test_pool().await;
        let dir = sqlx::query("INSERT INTO directories (name, path, last_modified) VALUES ('x', '', 1)")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query(
            "INSERT INTO photos (directory_id, name, creation_date, width, height, file_size) VALUES (?1, 'p.jpg', 0, 1, 1, 1)",
        )
        .bind(dir)
        .execute(&pool)
        .await
        .unwrap();

        let (keywords, camera): (String, String) =
            sqlx::query_as("SELECT keywords, camera_data FROM photos").fetch_one(&pool).await.unwrap();
        assert_eq!(keywords, "[]");
        assert_eq!(camera, "{}");
    }
}
