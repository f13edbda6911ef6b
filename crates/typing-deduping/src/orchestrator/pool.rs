//! Bounded worker pool for per-stream tasks.
//!
//! The pool is sized once and reused for every concurrent step of a sync.
//! Each submitted task holds one permit while it runs; [`WorkerPool::run_all`]
//! waits for every task before returning, successes and failures alike.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::error::{Result, StreamFailure, TypingError};

/// Owned pool of `size` concurrent task slots.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool with `size` slots (at least one).
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        let size = size.max(1);
        let name = name.into();
        debug!("Created worker pool {} with {} slots", name, size);
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Run every job and wait for all of them.
    ///
    /// Results come back in submission order, each paired with its key. A
    /// failing job never cancels its siblings. Jobs submitted after
    /// [`shutdown`](Self::shutdown) fail with [`TypingError::PoolClosed`].
    pub async fn run_all<K, T, F>(&self, jobs: Vec<(K, F)>) -> Vec<(K, Result<T>)>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handles = Vec::with_capacity(jobs.len());

        for (key, job) in jobs {
            match self.permits.clone().acquire_owned().await {
                Ok(permit) => {
                    let handle = tokio::spawn(async move {
                        let result = job.await;
                        drop(permit);
                        result
                    });
                    handles.push((key, Some(handle)));
                }
                Err(_) => handles.push((key, None)),
            }
        }

        let mut results = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(TypingError::TaskPanicked(e.to_string())),
                },
                None => Err(TypingError::PoolClosed(self.name.clone())),
            };
            results.push((key, result));
        }
        results
    }

    /// Release the pool. Running tasks finish; new submissions are refused.
    pub fn shutdown(&self) {
        if !self.permits.is_closed() {
            info!("Shutting down worker pool {}", self.name);
            self.permits.close();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.permits.close();
    }
}

/// Split `run_all` output into successes, or one aggregated error naming
/// every failing key.
pub(crate) fn collect_outcomes<K, T>(operation: &str, outcomes: Vec<(K, Result<T>)>) -> Result<Vec<(K, T)>>
where
    K: Display,
{
    let mut successes = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for (key, outcome) in outcomes {
        match outcome {
            Ok(value) => successes.push((key, value)),
            Err(e) => {
                error!("{}: {} failed - {}", key, operation, e);
                failures.push(StreamFailure {
                    stream: key.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(successes)
    } else {
        error!(
            "{} failed for {} of {} streams",
            operation,
            failures.len(),
            failures.len() + successes.len()
        );
        Err(TypingError::stream_failures(operation, failures))
    }
}
