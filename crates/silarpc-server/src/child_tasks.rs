//! Bounded executor for child tasks spawned by feature implementations.
//!
//! Implementations are synchronous; their long-running work (observable
//! command executions in particular) runs here, on the blocking pool,
//! bounded by a semaphore sized independently from the RPC worker pool so
//! that spawned work cannot starve call acceptance.

use crate::errors::{Result, ServerError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct ChildTaskExecutor {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ChildTaskExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Submits a job to the pool.
    ///
    /// The job waits for a worker slot, then runs on the blocking pool.
    /// Submission fails once [`shutdown`](Self::shutdown) has begun.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ServerError::ShuttingDown);
        }
        let semaphore = self.semaphore.clone();
        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let _ = tokio::task::spawn_blocking(job).await;
        });
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
        Ok(())
    }

    /// Rejects further submissions and waits for every submitted job to
    /// finish (`shutdown(wait=True)` semantics).
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_submitted_jobs_run() {
        let executor = ChildTaskExecutor::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = counter.clone();
            executor
                .submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        executor.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_work() {
        let executor = ChildTaskExecutor::new(2);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        executor
            .submit(move || {
                std::thread::sleep(Duration::from_millis(50));
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        executor.shutdown().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let executor = ChildTaskExecutor::new(1);
        executor.shutdown().await;
        let result = executor.submit(|| {});
        assert!(matches!(result, Err(ServerError::ShuttingDown)));
    }
}
