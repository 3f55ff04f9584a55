// Bounded fan-out with an explicit join, used for relayers and channel pairs alike

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Runs units of work on the runtime with at most `width` in flight.
///
/// Units are independent: a unit that panics yields `None` in its slot and
/// never affects its siblings. [`WorkerPool::run`] returns only after every
/// unit has finished, so callers can treat its return as a join barrier.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    width: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, width: usize) -> Self {
        Self {
            name,
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Apply `work` to every item; results come back in input order
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let permits = Arc::new(Semaphore::new(self.width));
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let work = Arc::clone(&work);
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                (index, work(item).await)
            });
        }

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(pool = self.name, "Worker unit aborted: {}", e),
            }
        }
        results
    }
}
