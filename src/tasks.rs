use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Hands work off to run outside the request that produced it.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, name: &str, task: BoxFuture<'static, ()>);
}

/// Tokio-backed spawner that keeps track of in-flight tasks for shutdown.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Number of tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait up to `grace` for running tasks.
    /// Returns false if some tasks were still running when time ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.in_flight();
        if pending > 0 {
            info!("Waiting for {} background task(s) to finish", pending);
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Shutdown grace period elapsed with {} task(s) still running",
                    self.in_flight()
                );
                false
            }
        }
    }
}

impl TaskSpawner for BackgroundTasks {
    fn spawn(&self, name: &str, task: BoxFuture<'static, ()>) {
        debug!("Spawning background task: {}", name);
        self.tracker.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = oneshot::channel();
        tasks.spawn(
            "send",
            async move {
                let _ = tx.send(42);
            }
            .boxed(),
        );
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_tasks() {
        let tasks = BackgroundTasks::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        tasks.spawn(
            "slow",
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                flag.store(true, Ordering::SeqCst);
            }
            .boxed(),
        );

        assert!(tasks.shutdown(Duration::from_secs(5)).await);
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("stuck", futures::future::pending::<()>().boxed());

        assert!(!tasks.shutdown(Duration::from_millis(20)).await);
        assert_eq!(tasks.in_flight(), 1);
    }
}
