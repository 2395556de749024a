use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{run_task, TaskContext, TaskExecutor, TaskId, WorkerError, WorkerReply, WorkerRequest};

struct Envelope {
    id: TaskId,
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerReply>,
}

/// Fixed set of long-lived worker threads sharing one bounded queue.
///
/// Each unit takes one task at a time and answers on the submission's own
/// oneshot channel. A task that panics drops its reply sender, so that
/// submission resolves as [`WorkerError::NoReply`], and the unit goes on
/// with the next envelope. Units only exit once the pool is dropped.
pub struct WorkerPool {
    queue: Sender<Envelope>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    pub fn start(ctx: Arc<TaskContext>, workers: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let size = workers.max(1);
        let (queue, rx) = crossbeam_channel::bounded::<Envelope>(queue_capacity.max(1));
        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let rx = rx.clone();
            let ctx = ctx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("bilderwald-worker-{}", index))
                .spawn(move || worker_loop(index, ctx, rx))?;
            handles.push(handle);
        }
        tracing::info!("Started {} worker units (queue capacity {})", size, queue_capacity);
        Ok(Self { queue, handles: Mutex::new(handles), size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Units that have not exited.
    pub fn live_workers(&self) -> usize {
        match self.handles.lock() {
            Ok(handles) => handles.iter().filter(|h| !h.is_finished()).count(),
            Err(_) => 0,
        }
    }
}

fn worker_loop(index: usize, ctx: Arc<TaskContext>, rx: Receiver<Envelope>) {
    tracing::debug!("Worker {} is waiting for tasks", index);
    while let Ok(envelope) = rx.recv() {
        let Envelope { id, request, reply } = envelope;
        tracing::trace!("Worker {} running {} task {}", index, request.kind(), id);
        let kind = request.kind();
        match panic::catch_unwind(AssertUnwindSafe(|| run_task(&ctx, request))) {
            Ok(answer) => {
                if reply.send(answer).is_err() {
                    tracing::debug!("Caller of task {} is gone, reply dropped", id);
                }
            }
            Err(_) => {
                tracing::error!("Worker {} panicked while running {} task {}", index, kind, id);
                drop(reply);
            }
        }
    }
    tracing::debug!("Worker {} stopped", index);
}

#[async_trait]
impl TaskExecutor for WorkerPool {
    async fn execute(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope { id, request, reply: tx };

        // A full queue blocks the sender, so enqueue off the async threads.
        let queue = self.queue.clone();
        let enqueued = tokio::task::spawn_blocking(move || queue.send(envelope).is_ok())
            .await
            .unwrap_or(false);
        if !enqueued {
            tracing::error!("No live worker accepted task {}", id);
            return Err(WorkerError::NoReply(id));
        }

        rx.await.map_err(|_| {
            tracing::error!("Task {} was never answered", id);
            WorkerError::NoReply(id)
        })
    }

    fn strategy(&self) -> &'static str {
        "pooled"
    }
}
