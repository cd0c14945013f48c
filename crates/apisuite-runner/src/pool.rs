//! Process-wide worker pool
//!
//! One fixed-size pool is shared by every run in the process. Runs do not get
//! their own capacity; concurrent runs compete for the same workers.

use rayon::ThreadPool;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool size must be at least 1")]
    ZeroCapacity,
    #[error("Cannot start worker pool: {0}")]
    Build(String),
}

/// Fixed number of worker threads executing scenario calls.
pub struct WorkerPool {
    inner: ThreadPool,
    capacity: usize,
}

impl WorkerPool {
    /// Build a pool with exactly `capacity` workers.
    ///
    /// # Errors
    ///
    /// Returns error for a zero capacity or if threads cannot be spawned.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("apisuite-worker-{i}"))
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;
        Ok(Self { inner, capacity })
    }

    /// Single worker; executions run one after another.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned.
    pub fn serial() -> Result<Self, PoolError> {
        Self::new(1)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `op` inside the pool, blocking the caller until it returns.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.inner.install(op)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(WorkerPool::new(0), Err(PoolError::ZeroCapacity)));
    }

    #[test]
    fn concurrency_never_exceeds_capacity() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.capacity(), 3);

        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        pool.install(|| {
            (0..24).into_par_iter().for_each(|_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            });
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn serial_pool_has_one_worker() {
        let pool = WorkerPool::serial().unwrap();
        let threads = pool.install(rayon::current_num_threads);
        assert_eq!(threads, 1);
    }
}
