use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::{io, thread};

/// A bounded pool of worker threads for streaming builds.
///
/// `spawn` blocks until a slot is free, which bounds the number of
/// concurrently running producers instead of growing one thread per request
/// without limit.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    capacity: usize,
    active: Mutex<usize>,
    freed: Condvar,
}

impl WorkerPool {
    /// Creates a pool with room for `capacity` concurrent workers.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity: capacity.max(1),
                active: Mutex::new(0),
                freed: Condvar::new(),
            }),
        }
    }

    /// Creates a pool sized to the available parallelism.
    pub fn with_default_capacity() -> Self {
        let capacity = thread::available_parallelism().map_or(4, usize::from);
        Self::new(capacity)
    }

    /// Runs `task` on a pool thread, blocking the caller until a slot frees
    /// up when the pool is saturated.
    pub fn spawn(
        &self,
        name: impl Into<String>,
        task: impl FnOnce() + Send + 'static,
    ) -> io::Result<()> {
        {
            let mut active = self.inner.active.lock();
            while *active >= self.inner.capacity {
                self.inner.freed.wait(&mut active);
            }
            *active += 1;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new().name(name.into()).spawn(move || {
            let _slot = SlotGuard(inner);
            task();
        });
        if let Err(error) = spawned {
            drop(SlotGuard(Arc::clone(&self.inner)));
            return Err(error);
        }
        Ok(())
    }

    /// Number of currently running workers.
    pub fn active(&self) -> usize {
        *self.inner.active.lock()
    }

    /// Capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// Releases a pool slot when dropped, including on worker panic.
struct SlotGuard(Arc<PoolInner>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut active = self.0.active.lock();
        *active = active.saturating_sub(1);
        drop(active);
        self.0.freed.notify_one();
    }
}
