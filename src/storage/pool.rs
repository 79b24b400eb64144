use std::sync::Arc;

use tokio::sync::Semaphore;

use super::{Error, Result};

/// Bounded pool for CPU-bound row decoding and chunk merging.
///
/// Jobs run on tokio's blocking threads, at most `size` at a time.
#[derive(Clone)]
pub struct DecodePool {
    permits: Arc<Semaphore>,
}

impl DecodePool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Worker(format!("decode pool closed: {e}")))?;
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });
        handle
            .await
            .map_err(|e| Error::Worker(format!("decode task failed: {e}")))?
    }
}
