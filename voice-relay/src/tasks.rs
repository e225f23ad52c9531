//! A supervised set of background tasks sharing one cancellation token.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Background tasks that are cancelled and awaited together.
///
/// Finished tasks leave the set on their own. Cancellation is observed at
/// the task's next await point.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the runtime. It is dropped when the set is cancelled.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tracing::debug!(task = name, "Spawning task");
        self.tracker.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => tracing::debug!(task = name, "Task cancelled"),
                _ = future => tracing::debug!(task = name, "Task finished"),
            }
        });
    }

    /// The token shared by every task in the set.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel every task and wait for all of them to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::debug!("All tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn finished_tasks_leave_the_set() {
        let tasks = TaskSet::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tasks.spawn("quick", async move {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        // The wrapper completes right after the inner future.
        for _ in 0..50 {
            if tasks.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_tasks() {
        let tasks = TaskSet::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        tasks.spawn("forever", async move {
            std::future::pending::<()>().await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(tasks.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), tasks.shutdown()).await.unwrap();

        assert!(tasks.is_empty());
        assert!(tasks.is_cancelled());
        assert!(!finished.load(Ordering::SeqCst));
    }
}
