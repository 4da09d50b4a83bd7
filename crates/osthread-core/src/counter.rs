//! Task accounting
//!
//! Two counters live here:
//!
//! - [`InFlight`] - per-worker count of submitted-but-unfinished closures,
//!   with a blocking wait for the count to drain to zero.
//! - [`TaskCounter`] - a cloneable, monotonically increasing total shared
//!   between workers (pool-wide telemetry).

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Shared monotonic task total
///
/// Clones share the same counter. A pool hands one clone to each of its
/// workers, and every accepted handoff bumps it once.
#[derive(Debug, Clone, Default)]
pub struct TaskCounter {
    count: Arc<AtomicU64>,
}

impl TaskCounter {
    /// Create a counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one, returning the new total
    #[inline]
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current total
    #[inline]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// In-flight task count for a single worker
///
/// Mutated only with atomic increment/decrement. The mutex and condvar are
/// touched only on the transition to zero and by [`wait_idle`](Self::wait_idle).
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    lock: Mutex<()>,
    idle: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement, waking idle waiters when the count reaches zero
    ///
    /// Returns `true` if this call brought the count to zero.
    pub fn decrement(&self) -> bool {
        let prev = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "in-flight counter underflow");

        if prev == 1 {
            // Taking the lock orders this notify after any waiter's check.
            let _guard = self.lock.lock();
            self.idle.notify_all();
            return true;
        }
        false
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Block until the count is zero
    pub fn wait_idle(&self) {
        let mut guard = self.lock.lock();
        while self.get() != 0 {
            self.idle.wait(&mut guard);
        }
    }
}
