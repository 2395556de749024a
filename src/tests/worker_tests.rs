#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::ThreadingConfig;
    use crate::metrics::Metrics;
    use crate::scanner::{DirectoryScanner, MetadataExtractor, ScanOptions};
    use crate::types::PhotoMetadata;
    use crate::tests::sample_library;
    use crate::worker::{
        Dispatcher, InProcessExecutor, RenderInput, RendererKind, ScanTask, TaskContext, TaskExecutor,
        TaskOutput, WorkerError, WorkerPool, WorkerRequest,
    };

    fn make_dispatcher(root: &std::path::Path, threaded: bool) -> (Dispatcher, Metrics) {
        let scanner = DirectoryScanner::with_exif(root, ScanOptions::default()).unwrap();
        let metrics = Metrics::new();
        let threading = ThreadingConfig { enable: threaded, workers: Some(2), queue_capacity: 4 };
        (Dispatcher::from_config(&threading, scanner, metrics.clone()).unwrap(), metrics)
    }

    #[test]
    fn requests_use_the_tagged_wire_format() {
        let request = WorkerRequest::Scan(ScanTask { relative_path: "2019/summer".into() });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "scan");
        assert_eq!(value["payload"]["relativePath"], "2019/summer");

        let parsed: WorkerRequest = serde_json::from_value(serde_json::json!({
            "type": "thumbnail",
            "payload": {
                "input": {"source": "a.jpg", "target": "t/a.jpg", "size": 64, "makeSquare": true},
                "renderer": "fast"
            }
        }))
        .unwrap();
        assert_eq!(parsed.kind(), "thumbnail");
    }

    #[tokio::test]
    async fn both_strategies_scan_the_same_directory() {
        let library = sample_library();
        for threaded in [false, true] {
            let (dispatcher, metrics) = make_dispatcher(library.path(), threaded);
            assert_eq!(dispatcher.strategy(), if threaded { "pooled" } else { "in-process" });

            let dir = dispatcher.scan_directory("2019").await.unwrap();
            assert_eq!(dir.name, "2019");
            assert_eq!(dir.photos.len(), 3);
            assert_eq!(metrics.tasks_dispatched.load(Ordering::Relaxed), 1);
            assert_eq!(metrics.tasks_failed.load(Ordering::Relaxed), 0);
        }
    }

    #[tokio::test]
    async fn missing_path_is_an_error_reply_not_a_failure() {
        let library = sample_library();
        for threaded in [false, true] {
            let (dispatcher, metrics) = make_dispatcher(library.path(), threaded);

            let reply = dispatcher
                .dispatch(WorkerRequest::Scan(ScanTask { relative_path: "does/not/exist".into() }))
                .await
                .expect("a reply arrives");
            let message = reply.error.clone().expect("error set");
            assert!(message.contains("not found"), "{}", message);
            assert!(reply.result.is_none());
            assert_eq!(metrics.tasks_failed.load(Ordering::Relaxed), 1);

            let err = dispatcher.scan_directory("does/not/exist").await.unwrap_err();
            assert!(matches!(err, WorkerError::NotFound(_)), "{:?}", err);

            let err = dispatcher.scan_directory("a.png").await.unwrap_err();
            assert!(matches!(err, WorkerError::Task(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn pool_answers_many_submissions() {
        let library = sample_library();
        let scanner = DirectoryScanner::with_exif(library.path(), ScanOptions::default()).unwrap();
        let pool = Arc::new(WorkerPool::start(Arc::new(TaskContext { scanner }), 3, 2).unwrap());
        assert_eq!(pool.size(), 3);

        let mut handles = Vec::new();
        for i in 0..12 {
            let pool = pool.clone();
            let path = if i % 2 == 0 { "2019" } else { "" };
            handles.push(tokio::spawn(async move {
                pool.execute(WorkerRequest::Scan(ScanTask { relative_path: path.into() })).await
            }));
        }
        for handle in handles {
            let reply = handle.await.unwrap().unwrap();
            assert!(matches!(reply.into_result().unwrap(), TaskOutput::Directory(_)));
        }
        assert_eq!(pool.live_workers(), 3);
    }

    #[tokio::test]
    async fn in_process_executor_renders_thumbnails() {
        let library = sample_library();
        let scanner = DirectoryScanner::with_exif(library.path(), ScanOptions::default()).unwrap();
        let executor = InProcessExecutor::new(Arc::new(TaskContext { scanner }));
        let dispatcher = Dispatcher::new(Arc::new(executor), Metrics::new());

        let out = tempfile::TempDir::new().unwrap();
        let input = RenderInput {
            source: library.path().join("a.png"),
            target: out.path().join("a_3.png"),
            size: 3,
            make_square: true,
        };
        let written = dispatcher.render_thumbnail(input, RendererKind::Fast).await.unwrap();
        assert_eq!(image::image_dimensions(written).unwrap(), (3, 3));
    }

    struct PanickingExtractor;

    impl MetadataExtractor for PanickingExtractor {
        fn extract(&self, path: &Path, _fs_meta: &fs::Metadata) -> PhotoMetadata {
            panic!("cannot decode {}", path.display());
        }
    }

    fn panicking_context(root: &Path) -> Arc<TaskContext> {
        let scanner =
            DirectoryScanner::new(root, ScanOptions::default(), Arc::new(PanickingExtractor)).unwrap();
        Arc::new(TaskContext { scanner })
    }

    #[tokio::test]
    async fn panicking_tasks_resolve_as_no_reply() {
        let library = sample_library();
        let pool = Arc::new(WorkerPool::start(panicking_context(library.path()), 1, 2).unwrap());

        // more submissions than units, so most wait in the queue while the first panics
        let mut handles = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let request = WorkerRequest::Scan(ScanTask { relative_path: String::new() });
                tokio::time::timeout(Duration::from_secs(10), pool.execute(request)).await
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap().expect("submission resolved in time");
            assert!(matches!(outcome, Err(WorkerError::NoReply(_))), "{:?}", outcome);
        }

        // the unit survives and still answers tasks that do not panic
        assert_eq!(pool.live_workers(), 1);
        let reply = pool
            .execute(WorkerRequest::Scan(ScanTask { relative_path: "2020".into() }))
            .await
            .unwrap();
        assert!(matches!(reply.into_result().unwrap(), TaskOutput::Directory(_)));
    }

    #[tokio::test]
    async fn panicking_task_in_process_resolves_as_no_reply() {
        let library = sample_library();
        let metrics = Metrics::new();
        let executor = InProcessExecutor::new(panicking_context(library.path()));
        let dispatcher = Dispatcher::new(Arc::new(executor), metrics.clone());

        let err = dispatcher.scan_directory("2019").await.unwrap_err();
        assert!(matches!(err, WorkerError::NoReply(_)), "{:?}", err);
        assert_eq!(metrics.tasks_failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn missing_thumbnail_source_is_not_found() {
        let library = sample_library();
        let (dispatcher, _metrics) = make_dispatcher(library.path(), true);
        let out = tempfile::TempDir::new().unwrap();
        let input = RenderInput {
            source: library.path().join("gone.png"),
            target: out.path().join("gone_3.jpg"),
            size: 3,
            make_square: false,
        };
        let err = dispatcher.render_thumbnail(input, RendererKind::Fast).await.unwrap_err();
        assert!(matches!(err, WorkerError::NotFound(_)), "{:?}", err);
    }
}
