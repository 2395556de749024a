use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use tower_http::compression::predicate::{DefaultPredicate, Predicate};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bilderwald::{
    catalog::Catalog,
    config, db,
    gallery::GalleryCache,
    metrics::Metrics,
    routes,
    scanner::{DirectoryScanner, ScanOptions},
    state::AppState,
    worker::Dispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "bilderwald.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush
    let _log_guards = (stdout_guard, file_guard);

    // Load configuration (embedded defaults -> bilderwald.toml -> env/.env)
    let app_cfg = config::load()?;

    let db_url = &app_cfg.database.url;
    config::ensure_sqlite_parent_dir(db_url)?;
    let pool = db::connect(db_url, app_cfg.database.max_connections).await?;
    db::init_db(&pool).await?;

    let metrics = Metrics::new();
    let images = &app_cfg.images;
    if !images.folder.is_dir() {
        tracing::warn!("Image folder {} does not exist, creating it", images.folder.display());
        std::fs::create_dir_all(&images.folder)?;
    }
    let scanner = DirectoryScanner::with_exif(&images.folder, ScanOptions::from_config(&app_cfg))?;
    let dispatcher = Dispatcher::from_config(&app_cfg.threading, scanner, metrics.clone())?;
    let gallery = GalleryCache::new(
        Catalog::new(pool.clone()),
        dispatcher,
        &images.folder,
        &images.thumbnail_folder,
        app_cfg.indexing.clone(),
        metrics.clone(),
    );
    info!(
        "Indexing {} (sensitivity {:?}, timeout {} ms)",
        images.folder.display(),
        app_cfg.indexing.re_indexing_sensitivity,
        app_cfg.indexing.cached_folder_timeout_ms
    );

    let state = AppState::new(gallery, app_cfg.clone(), metrics);
    let gallery = state.gallery.clone();

    // Compression, except for the SSE event stream
    #[derive(Clone)]
    struct NoSseDefault(DefaultPredicate);
    impl Predicate for NoSseDefault {
        fn should_compress<B: axum::body::HttpBody>(&self, res: &axum::http::Response<B>) -> bool {
            if let Some(ct) = res.headers().get(CONTENT_TYPE) {
                if let Ok(s) = ct.to_str() {
                    if s.starts_with("text/event-stream") {
                        return false;
                    }
                }
            }
            self.0.should_compress(res)
        }
    }
    let compression = CompressionLayer::new().compress_when(NoSseDefault(DefaultPredicate::new()));

    let app = routes::router(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // CORS: permissive in debug for a separately served UI
    let app = if cfg!(debug_assertions) { app.layer(CorsLayer::permissive()) } else { app };

    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Bilderwald listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Waiting for {} background catalog jobs", gallery.jobs().in_flight());
    gallery.jobs().settle().await;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
