use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::ReIndexingSensitivity;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    pub folder: PathBuf,
    pub thumbnail_folder: PathBuf,
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    pub re_indexing_sensitivity: ReIndexingSensitivity,
    pub cached_folder_timeout_ms: i64,
    pub folder_preview_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadingConfig {
    pub enable: bool,
    pub workers: Option<usize>,
    pub queue_capacity: usize,
}

impl ThreadingConfig {
    /// Worker count, defaulting to half the cores (at least one).
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| (num_cpus::get() / 2).max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub images: ImagesConfig,
    pub indexing: IndexingConfig,
    pub threading: ThreadingConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self {
            re_indexing_sensitivity: ReIndexingSensitivity::Low,
            cached_folder_timeout_ms: 60 * 60 * 1000,
            folder_preview_size: 2,
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: bilderwald.toml (in CWD)
        .add_source(::config::File::with_name("bilderwald").required(false));

    if let Ok(custom_path) = std::env::var("BILDERWALD_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("BILDERWALD")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("images.extensions")
            .with_list_parse_key("images.excludes")
            .try_parsing(true),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Images
    if cfg.images.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(anyhow::anyhow!("images.extensions must name at least one extension"));
    }
    for pattern in &cfg.images.excludes {
        let norm = pattern.trim().replace('\\', "/");
        if norm.is_empty() {
            continue;
        }
        if let Err(e) = globset::Glob::new(&norm) {
            return Err(anyhow::anyhow!("invalid images.excludes pattern {}: {}", pattern, e));
        }
    }

    // Indexing
    if cfg.indexing.folder_preview_size == 0 || cfg.indexing.folder_preview_size > 100 {
        return Err(anyhow::anyhow!("indexing.folder_preview_size must be in 1..=100"));
    }
    if cfg.indexing.cached_folder_timeout_ms < 0 {
        return Err(anyhow::anyhow!("indexing.cached_folder_timeout_ms must be >= 0"));
    }

    // Threading
    if cfg.threading.queue_capacity == 0 {
        return Err(anyhow::anyhow!("threading.queue_capacity must be > 0"));
    }
    if let Some(w) = cfg.threading.workers {
        if w == 0 || w > 64 {
            return Err(anyhow::anyhow!("threading.workers must be in 1..=64"));
        }
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // sqlite:///C:/... on Windows carries a leading '/' before the drive letter
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
