use std::future::Future;

use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::types::IndexEvent;

/// Detached catalog work that outlives the request which started it.
#[derive(Clone)]
pub struct BackgroundJobs {
    tracker: TaskTracker,
    events: broadcast::Sender<IndexEvent>,
}

impl BackgroundJobs {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self { tracker: TaskTracker::new(), events }
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(job);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    /// Sends to current subscribers; dropped when there are none.
    pub fn publish(&self, event: IndexEvent) {
        let _ = self.events.send(event);
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every job spawned so far has finished.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for BackgroundJobs {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn settle_waits_for_spawned_jobs() {
        let jobs = BackgroundJobs::default();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            jobs.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        jobs.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(jobs.in_flight(), 0);

        // still usable afterwards
        let done2 = done.clone();
        jobs.spawn(async move {
            done2.fetch_add(1, Ordering::SeqCst);
        });
        jobs.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let jobs = BackgroundJobs::default();
        jobs.publish(IndexEvent::RefreshScheduled { path: "nobody".into() });
        let mut rx = jobs.subscribe();
        jobs.publish(IndexEvent::RefreshScheduled { path: "2020".into() });
        match rx.recv().await.unwrap() {
            IndexEvent::RefreshScheduled { path } => assert_eq!(path, "2020"),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
