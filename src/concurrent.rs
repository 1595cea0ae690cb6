use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded worker pool. A permit is taken before each task is spawned, so at
/// most `concurrency` tasks run at once and tasks start in submission order.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            completed: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs every task and waits for all of them. Results come back in
    /// completion order; a panicked task is counted and dropped.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<T>, task_fn: F) -> Vec<Fut::Output>
    where
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future + Send + 'static,
        Fut::Output: Send + 'static,
        T: Send + 'static,
    {
        let mut futures = FuturesUnordered::new();
        let mut results = Vec::with_capacity(tasks.len());

        for task in tasks {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let task_fn = task_fn.clone();
            let completed = self.completed.clone();

            futures.push(tokio::spawn(async move {
                let result = task_fn(task).await;
                completed.fetch_add(1, Ordering::Relaxed);
                drop(permit);
                result
            }));

            // Drain whatever already finished so the set stays small.
            while let Some(Some(done)) = futures.next().now_or_never() {
                self.collect(done, &mut results);
            }
        }

        while let Some(done) = futures.next().await {
            self.collect(done, &mut results);
        }
        results
    }

    fn collect<O>(&self, done: Result<O, tokio::task::JoinError>, results: &mut Vec<O>) {
        match done {
            Ok(output) => results.push(output),
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("worker task failed: {}", e);
            }
        }
    }

    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}
