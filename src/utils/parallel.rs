//! # Parallelism Utilities (CPU Threading)
//!
//! The stages are data-parallel through `rayon`. By default they run on
//! rayon's global pool; `ParallelConfig` can pin them to a dedicated pool
//! with a fixed number of threads instead.

use crate::tensor::TensorError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Threads in the dedicated pool. `None` uses rayon's global pool;
    /// `Some(1)` runs every stage sequentially. `Some(0)` is rejected by
    /// [`ParallelConfig::build_pool`].
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Uses rayon's global pool.
    pub fn global() -> Self {
        ParallelConfig { num_threads: None }
    }

    /// Uses a dedicated pool of `num_threads` threads.
    pub fn with_threads(num_threads: usize) -> Self {
        ParallelConfig { num_threads: Some(num_threads) }
    }

    /// Builds the dedicated pool, or `None` when the global pool is configured.
    ///
    /// # Errors
    /// * `TensorError::ThreadPool` if zero threads are requested or rayon
    ///   cannot spawn the workers.
    pub fn build_pool(&self) -> Result<Option<ThreadPool>, TensorError> {
        let Some(threads) = self.num_threads else {
            return Ok(None);
        };
        if threads == 0 {
            return Err(TensorError::ThreadPool("cannot build a pool with 0 threads".to_string()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rconv-worker-{i}"))
            .build()
            .map_err(|e| TensorError::ThreadPool(e.to_string()))?;
        tracing::debug!(threads = pool.current_num_threads(), "built dedicated thread pool");
        Ok(Some(pool))
    }

    /// Runs `op` under this configuration.
    ///
    /// Builds a fresh pool on every call; hold on to `build_pool`'s result
    /// (as `Sequential::with_parallelism` does) when running many inputs.
    pub fn install<OP, R>(&self, op: OP) -> Result<R, TensorError>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match self.build_pool()? {
            Some(pool) => Ok(pool.install(op)),
            None => Ok(op()),
        }
    }
}
