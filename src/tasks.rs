//! Fire-and-forget background work.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// A unit of background work. It receives a token that is cancelled on shutdown.
pub type BackgroundWorkItem = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send>;

pub trait BackgroundTaskQueue: Send + Sync {
    /// Queues work and returns immediately; the caller never observes completion.
    fn queue_background_work_item(&self, work: BackgroundWorkItem);
}

/// Wraps an async closure as a [`BackgroundWorkItem`].
pub fn work_item<F, Fut>(f: F) -> BackgroundWorkItem
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |token| Box::pin(f(token)))
}

/// Background queue running each work item as a tokio task.
#[derive(Clone)]
pub struct TokioTaskQueue {
    handle: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TokioTaskQueue {
    /// Must be called from inside a tokio runtime; work items are spawned on it.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task queued so far (and any they queue) has finished.
    pub async fn wait_idle(&self) {
        while !self.tracker.is_empty() {
            self.tracker.close();
            self.tracker.wait().await;
            self.tracker.reopen();
        }
    }

    /// Cancels outstanding work and waits for it to wind down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Default for TokioTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTaskQueue for TokioTaskQueue {
    fn queue_background_work_item(&self, work: BackgroundWorkItem) {
        let token = self.shutdown.child_token();
        debug!(pending = self.tracker.len(), "queueing background work item");
        self.tracker.spawn_on(work(token), &self.handle);
    }
}
