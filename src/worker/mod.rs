//! Offloaded scan and thumbnail tasks.
//!
//! A request goes to a [`TaskExecutor`] and comes back as exactly one
//! [`WorkerReply`]. Task failures travel inside the reply (`error` set,
//! `result` empty, `kind` telling a missing path from other failures). A
//! task that panics, or a pool that cannot take the submission, surfaces as
//! [`WorkerError::NoReply`] for that submission.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ThreadingConfig;
use crate::metrics::Metrics;
use crate::scanner::{DirectoryScanner, ScanError, ScannedDirectory};

pub mod pool;
pub mod thumbnail;

pub use pool::WorkerPool;
pub use thumbnail::{RenderInput, RendererKind};

/// Identity of one submission, used to correlate logs with replies.
pub type TaskId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTask {
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailTask {
    pub input: RenderInput,
    pub renderer: RendererKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WorkerRequest {
    Scan(ScanTask),
    Thumbnail(ThumbnailTask),
}

impl WorkerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::Scan(_) => "scan",
            WorkerRequest::Thumbnail(_) => "thumbnail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutput {
    Directory(ScannedDirectory),
    Thumbnail { path: PathBuf },
}

/// Category of a failed task, so callers can tell a vanished path from a broken one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    #[default]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub error: Option<String>,
    pub result: Option<TaskOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl WorkerReply {
    pub fn success(result: TaskOutput) -> Self {
        Self { error: None, result: Some(result), kind: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::failure_of(FailureKind::Failed, message)
    }

    pub fn failure_of(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), result: None, kind: Some(kind) }
    }

    pub fn into_result(self) -> Result<TaskOutput, WorkerError> {
        match (self.error, self.result) {
            (Some(message), _) => match self.kind.unwrap_or_default() {
                FailureKind::NotFound => Err(WorkerError::NotFound(message)),
                FailureKind::Failed => Err(WorkerError::Task(message)),
            },
            (None, Some(output)) => Ok(output),
            (None, None) => Err(WorkerError::EmptyReply),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("task failed: {0}")]
    Task(String),
    #[error("{0}")]
    NotFound(String),
    #[error("task {0} was never answered")]
    NoReply(TaskId),
    #[error("worker replied without error or result")]
    EmptyReply,
    #[error("worker replied with {0} output")]
    UnexpectedOutput(&'static str),
}

/// Everything a unit needs to run tasks.
pub struct TaskContext {
    pub scanner: DirectoryScanner,
}

/// Runs one task to completion on the calling thread.
pub fn run_task(ctx: &TaskContext, request: WorkerRequest) -> WorkerReply {
    match request {
        WorkerRequest::Scan(task) => match ctx.scanner.scan(&task.relative_path) {
            Ok(dir) => WorkerReply::success(TaskOutput::Directory(dir)),
            Err(e @ ScanError::NotFound(_)) => {
                WorkerReply::failure_of(FailureKind::NotFound, e.to_string())
            }
            Err(e) => WorkerReply::failure(e.to_string()),
        },
        WorkerRequest::Thumbnail(task) => match thumbnail::render(&task.input, task.renderer) {
            Ok(path) => WorkerReply::success(TaskOutput::Thumbnail { path }),
            Err(e) if e.is_missing_source() => {
                WorkerReply::failure_of(FailureKind::NotFound, e.to_string())
            }
            Err(e) => WorkerReply::failure(e.to_string()),
        },
    }
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Resolves once the task has been answered.
    async fn execute(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError>;

    fn strategy(&self) -> &'static str;
}

/// Runs tasks in this process on the runtime's blocking pool.
pub struct InProcessExecutor {
    ctx: Arc<TaskContext>,
}

impl InProcessExecutor {
    pub fn new(ctx: Arc<TaskContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskExecutor for InProcessExecutor {
    async fn execute(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let id = Uuid::new_v4();
        let ctx = self.ctx.clone();
        tracing::trace!("Running {} task {} in-process", request.kind(), id);
        tokio::task::spawn_blocking(move || run_task(&ctx, request)).await.map_err(|e| {
            tracing::error!("In-process task {} aborted: {}", id, e);
            WorkerError::NoReply(id)
        })
    }

    fn strategy(&self) -> &'static str {
        "in-process"
    }
}

/// Typed front of the configured executor.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn TaskExecutor>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn TaskExecutor>, metrics: Metrics) -> Self {
        Self { executor, metrics }
    }

    /// Pooled units when threading is enabled, in-process otherwise.
    pub fn from_config(
        cfg: &ThreadingConfig,
        scanner: DirectoryScanner,
        metrics: Metrics,
    ) -> std::io::Result<Self> {
        let ctx = Arc::new(TaskContext { scanner });
        let executor: Arc<dyn TaskExecutor> = if cfg.enable {
            Arc::new(WorkerPool::start(ctx, cfg.worker_count(), cfg.queue_capacity)?)
        } else {
            Arc::new(InProcessExecutor::new(ctx))
        };
        tracing::info!("Task dispatcher using {} execution", executor.strategy());
        Ok(Self::new(executor, metrics))
    }

    pub fn strategy(&self) -> &'static str {
        self.executor.strategy()
    }

    pub async fn dispatch(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        self.metrics.inc_tasks_dispatched();
        let kind = request.kind();
        let outcome = self.executor.execute(request).await;
        match &outcome {
            Ok(WorkerReply { error: Some(message), .. }) => {
                self.metrics.inc_tasks_failed();
                tracing::debug!("{} task reported an error: {}", kind, message);
            }
            Err(e) => {
                self.metrics.inc_tasks_failed();
                tracing::warn!("{} task lost: {}", kind, e);
            }
            Ok(_) => {}
        }
        outcome
    }

    pub async fn scan_directory(&self, relative_path: &str) -> Result<ScannedDirectory, WorkerError> {
        let request = WorkerRequest::Scan(ScanTask { relative_path: relative_path.to_string() });
        match self.dispatch(request).await?.into_result()? {
            TaskOutput::Directory(dir) => Ok(dir),
            TaskOutput::Thumbnail { .. } => Err(WorkerError::UnexpectedOutput("thumbnail")),
        }
    }

    pub async fn render_thumbnail(
        &self,
        input: RenderInput,
        renderer: RendererKind,
    ) -> Result<PathBuf, WorkerError> {
        let request = WorkerRequest::Thumbnail(ThumbnailTask { input, renderer });
        match self.dispatch(request).await?.into_result()? {
            TaskOutput::Thumbnail { path } => Ok(path),
            TaskOutput::Directory(_) => Err(WorkerError::UnexpectedOutput("directory")),
        }
    }
}
