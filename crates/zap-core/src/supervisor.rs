use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, warn};

use crate::Result;

/// Owner of every background task the bot spawns.
///
/// Short-lived tasks (watcher replies) are bounded by a permit pool so a
/// chatty group cannot pile up unbounded sends. Long-running tasks (bombers,
/// the daily scheduler) are tracked but not bounded. Either way a failing or
/// panicking task is logged under its name instead of vanishing.
#[derive(Clone)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl TaskSupervisor {
    pub fn new(max_in_flight: usize, cancel: CancellationToken) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            cancel,
        }
    }

    /// Root shutdown token. Loops take a child of it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a bounded task. Returns `false` (and drops `fut`) when at capacity
    /// or shutting down.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!(task = name, "shutting down, task not started");
            return false;
        }
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                warn!(task = name, "too many tasks in flight, dropping");
                return false;
            }
        };
        self.track(name, async move {
            let _permit = permit;
            fut.await
        });
        true
    }

    /// Spawn a tracked task that is not counted against the permit pool.
    pub fn spawn_long_running<F>(&self, name: &'static str, fut: F) -> bool
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!(task = name, "shutting down, task not started");
            return false;
        }
        self.track(name, fut);
        true
    }

    fn track<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.tracker.spawn(async move {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, "task failed: {e}"),
                Err(e) if e.is_panic() => error!(task = name, "task panicked: {e}"),
                Err(e) => debug!(task = name, "task cancelled: {e}"),
            }
        });
    }

    /// Number of tracked tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every task spawned so far has finished.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel the root token and wait up to `grace` for tasks to finish.
    ///
    /// Returns `true` if everything finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        self.tracker.close();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
