use crate::error::PoolError;
use log::warn;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounded executor for message handlers, outbound sends and periodic procedures.
///
/// At most `max_workers` units run at once and at most `max_queued` may be waiting or
/// running; anything beyond that is rejected so the caller can drop it.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    running: Arc<Semaphore>,
    queued: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_workers: usize, max_queued: usize) -> Self {
        Self {
            running: Arc::new(Semaphore::new(max_workers.max(1))),
            queued: Arc::new(Semaphore::new(max_queued.max(max_workers).max(1))),
        }
    }

    pub fn execute<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slot = self
            .queued
            .clone()
            .try_acquire_owned()
            .map_err(|_| PoolError::Saturated)?;
        let running = self.running.clone();

        tokio::spawn(async move {
            let _slot = slot;
            let _permit = match running.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            work.await;
        });
        Ok(())
    }

    /// Like `execute`, but logs and drops the work when the pool is saturated.
    pub fn submit<F>(&self, what: &str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = self.execute(work) {
            warn!("Dropping {}: {}", what, e);
        }
    }
}
