//! Fixed-capacity free-list of workers
//!
//! The free-list is the only place a pool keeps its workers. Taking one out
//! yields a [`Lease`], which is exclusive custody of that worker; dropping
//! the lease puts the worker back at the tail.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use crossbeam_queue::ArrayQueue;
use crossbeam_utils::Backoff;
use osthread_core::CancellationToken;

use crate::Worker;

pub(crate) struct FreeList {
    slots: ArrayQueue<Arc<Worker>>,
}

impl FreeList {
    /// Free-list that holds exactly `capacity` workers
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Workers currently not leased
    pub(crate) fn available(&self) -> usize {
        self.slots.len()
    }

    /// Return a worker to the tail
    pub(crate) fn release(&self, worker: Arc<Worker>) {
        let pushed = self.slots.push(worker);
        debug_assert!(pushed.is_ok(), "free-list over capacity");
    }

    /// Take any worker, blocking until one is available
    pub(crate) fn claim(&self) -> Lease<'_> {
        let backoff = Backoff::new();
        loop {
            if let Some(worker) = self.slots.pop() {
                return Lease { list: self, worker };
            }
            backoff.snooze();
        }
    }

    /// Take a worker with nothing in flight
    ///
    /// Scans every worker once; if all are busy, waits for a ping on `idle`
    /// and scans again. Returns `None` once `token` is cancelled.
    pub(crate) fn claim_idle(
        &self,
        idle: &Receiver<()>,
        token: &CancellationToken,
    ) -> Option<Lease<'_>> {
        loop {
            for _ in 0..self.capacity() {
                let lease = self.claim();
                if lease.in_flight() == 0 {
                    return Some(lease);
                }
            }

            select! {
                recv(idle) -> _ => {}
                recv(token.done()) -> _ => return None,
            }
        }
    }
}

impl fmt::Debug for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive, temporary custody of one worker
pub(crate) struct Lease<'a> {
    list: &'a FreeList,
    worker: Arc<Worker>,
}

impl Deref for Lease<'_> {
    type Target = Worker;

    #[inline]
    fn deref(&self) -> &Worker {
        &self.worker
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.list.release(Arc::clone(&self.worker));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerConfig;
    use osthread_core::TaskCounter;

    fn list_of(names: &[&str], root: &CancellationToken) -> FreeList {
        let list = FreeList::with_capacity(names.len());
        for name in names {
            let worker = Worker::with_config(root, None, WorkerConfig::new().name(*name));
            list.release(Arc::new(worker));
        }
        list
    }

    #[test]
    fn test_lease_returns_worker_on_drop() {
        let root = CancellationToken::new();
        let list = list_of(&["a", "b"], &root);
        assert_eq!(list.available(), 2);

        {
            let lease = list.claim();
            assert_eq!(lease.name(), "a");
            assert_eq!(list.available(), 1);
        }

        assert_eq!(list.available(), 2);
    }

    #[test]
    fn test_claims_rotate_fifo() {
        let root = CancellationToken::new();
        let list = list_of(&["a", "b", "c"], &root);

        let names: Vec<String> = (0..4)
            .map(|_| list.claim().name().to_string())
            .collect();

        assert_eq!(names, ["a", "b", "c", "a"]);
    }

    #[test]
    fn test_leases_are_exclusive() {
        let root = CancellationToken::new();
        let list = list_of(&["a", "b"], &root);

        let first = list.claim();
        let second = list.claim();
        assert_ne!(first.name(), second.name());
        assert_eq!(list.available(), 0);
    }

    #[test]
    fn test_lease_does_not_cancel_worker() {
        let root = CancellationToken::new();
        let list = list_of(&["a"], &root);

        drop(list.claim());
        assert!(!list.claim().token().is_cancelled());
    }

    #[test]
    fn test_claim_idle_skips_busy_worker() {
        let root = CancellationToken::new();
        let list = list_of(&["busy", "idle"], &root);
        let (_idle_tx, idle_rx) = crossbeam_channel::bounded(2);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        {
            let busy = list.claim();
            assert_eq!(busy.name(), "busy");
            busy.start().unwrap();
            busy.submit(move || {
                let _ = release_rx.recv();
            });
        }

        // [idle, busy] -> [busy, idle]
        drop(list.claim());

        let lease = list.claim_idle(&idle_rx, &root).unwrap();
        assert_eq!(lease.name(), "idle");
        assert_eq!(lease.in_flight(), 0);

        drop(release_tx);
    }

    #[test]
    fn test_claim_idle_waits_for_idle_signal() {
        let root = CancellationToken::new();
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(1);
        let list = FreeList::with_capacity(1);
        let worker = Worker::pooled(&root, TaskCounter::new(), WorkerConfig::new(), idle_tx);
        list.release(Arc::new(worker));
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        {
            let busy = list.claim();
            busy.start().unwrap();
            busy.submit(move || {
                let _ = release_rx.recv();
            });
        }

        let finisher = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            drop(release_tx);
        });

        let lease = list.claim_idle(&idle_rx, &root).unwrap();
        assert_eq!(lease.in_flight(), 0);
        finisher.join().unwrap();
    }

    #[test]
    fn test_claim_idle_gives_up_on_cancel() {
        let root = CancellationToken::new();
        let list = list_of(&["busy"], &root);
        let (_idle_tx, idle_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        {
            let busy = list.claim();
            busy.start().unwrap();
            busy.submit(move || {
                let _ = release_rx.recv();
            });
        }

        let canceller = {
            let root = root.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                root.cancel();
            })
        };

        assert!(list.claim_idle(&idle_rx, &root).is_none());
        canceller.join().unwrap();
        drop(release_tx);
    }
}
