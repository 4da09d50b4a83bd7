//! Fixed-size pool of pinned-thread workers
//!
//! The pool exposes one submission point over N [`Worker`]s. A dispatch
//! thread moves each submitted closure to a worker leased from the
//! free-list, then returns the worker once the handoff completes.
//!
//! ```text
//!   exec(f) ──► [submission channel, cap N] ──► dispatch loop
//!                                                 │ claim ▲ release
//!                                                 ▼       │
//!                                            [free-list of N workers]
//!                                                 │ submit
//!                                                 ▼
//!                                          worker thread runs f
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, Receiver, Sender};
use osthread_core::{CancellationToken, PoolError, PoolResult, Task, TaskCounter};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::affinity::{core_for_worker, CpuAffinity, PlatformAffinity};
use crate::free_list::FreeList;
use crate::{PoolConfig, Worker, WorkerConfig};

/// State shared between the pool handle and its dispatch thread
struct PoolShared {
    free: FreeList,
    submit_rx: Receiver<Task>,
    /// Pinged by workers whose in-flight count drops to zero
    idle_rx: Receiver<()>,
    token: CancellationToken,
    size: usize,
}

impl PoolShared {
    /// Claim every worker and join each one
    fn drain(&self) {
        let leases: Vec<_> = (0..self.size).map(|_| self.free.claim()).collect();
        for worker in &leases {
            worker.join();
        }
        debug!(workers = leases.len(), "all workers joined");
    }
}

/// A pool of exactly N dedicated OS threads
///
/// N is fixed at construction and must be strictly less than the host's
/// available parallelism, so at least one thread is left for everything
/// else.
///
/// # Example
///
/// ```rust,ignore
/// use osthread::{CancellationToken, ThreadPool};
///
/// let root = CancellationToken::new();
/// let pool = ThreadPool::new(&root, 2)?;
/// pool.start()?;
/// pool.exec(|| println!("on a worker thread"));
/// pool.stop();
/// pool.join();
/// ```
///
/// # Lifetime
///
/// Dropping the pool stops it and blocks until every worker has finished
/// its in-flight closure and exited. Closures still queued in the
/// submission channel at that point are dropped unrun.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    submit_tx: Sender<Task>,
    total: TaskCounter,
    dispatch_name: String,
    started: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Create a pool of `size` workers under `parent`
    ///
    /// Spawns and starts all workers; the dispatch loop waits for
    /// [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// [`PoolError::Capacity`] if `size` is 0 or not less than the host's
    /// available parallelism. [`PoolError::Spawn`] if a worker thread could
    /// not be created.
    pub fn new(parent: &CancellationToken, size: usize) -> PoolResult<Self> {
        Self::with_config(parent, PoolConfig::new().size(size))
    }

    /// Create a pool from an explicit configuration
    pub fn with_config(parent: &CancellationToken, config: PoolConfig) -> PoolResult<Self> {
        if !config.is_valid_size() {
            return Err(PoolError::Capacity {
                requested: config.size,
                available: config.parallelism,
            });
        }

        let size = config.size;
        let token = parent.child();
        let total = TaskCounter::new();
        let cores = if config.pin_cores {
            PlatformAffinity::allowed_cpus().unwrap_or_else(|err| {
                warn!(%err, "cannot read allowed cpus, workers will not be pinned");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let free = FreeList::with_capacity(size);
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(size);
        for index in 0..size {
            let mut worker_config =
                WorkerConfig::new().name(format!("{}-{index}", config.thread_name));
            if let Some(bytes) = config.stack_size {
                worker_config = worker_config.stack_size(bytes);
            }
            if let Some(cpu) = core_for_worker(&cores, index) {
                worker_config = worker_config.core(cpu);
            }

            let worker = Worker::pooled(&token, total.clone(), worker_config, idle_tx.clone());
            if let Err(err) = worker.start() {
                // Workers already in the free-list are cancelled as it drops.
                token.cancel();
                return Err(err);
            }
            free.release(Arc::new(worker));
        }

        let (submit_tx, submit_rx) = crossbeam_channel::bounded(size);

        debug!(size, parallelism = config.parallelism, pinned = !cores.is_empty(), "pool created");

        Ok(Self {
            shared: Arc::new(PoolShared {
                free,
                submit_rx,
                idle_rx,
                token,
                size,
            }),
            submit_tx,
            total,
            dispatch_name: format!("{}-dispatch", config.thread_name),
            started: AtomicBool::new(false),
            dispatcher: Mutex::new(None),
        })
    }

    /// Spawn the dispatch loop
    ///
    /// Only the first call spawns; later calls are logged and ignored.
    pub fn start(&self) -> PoolResult<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("pool already started");
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.dispatch_name.clone())
            .spawn(move || dispatch_loop(&shared));

        match spawned {
            Ok(handle) => {
                *self.dispatcher.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.started.store(false, Ordering::Release);
                Err(err.into())
            }
        }
    }

    /// Queue `f` for execution on some worker
    ///
    /// Blocks only while the submission channel (capacity N) is full. Once
    /// the pool is stopped, `f` is dropped unrun.
    pub fn exec<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.token.is_cancelled() {
            trace!("pool stopped, task dropped");
            return;
        }

        let task: Task = Box::new(f);
        select! {
            send(self.submit_tx, task) -> res => {
                if res.is_err() {
                    trace!("dispatch loop gone, task dropped");
                }
            }
            recv(self.shared.token.done()) -> _ => trace!("pool stopped while queueing, task dropped"),
        }
    }

    /// Signal shutdown
    ///
    /// Returns immediately. The dispatch loop then joins every worker
    /// (graceful, not [`Worker::stop`]) and exits; use [`join`](Self::join)
    /// to wait for that.
    pub fn stop(&self) {
        self.shared.token.cancel();
        debug!(dispatched = self.total.get(), "pool stop requested");
    }

    /// Block until the dispatch loop has exited
    ///
    /// Returns immediately if the pool was never started. Does not itself
    /// request shutdown. Must not be called from a closure running on one of
    /// this pool's workers.
    pub fn join(&self) {
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("dispatch thread panicked");
            }
        }
    }

    /// Number of workers (N)
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Closures handed to a worker so far
    pub fn total_tasks(&self) -> u64 {
        self.total.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
        if self.started.load(Ordering::Acquire) {
            self.join();
        } else {
            self.shared.drain();
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("size", &self.shared.size)
            .field("free", &self.shared.free)
            .field("queued", &self.submit_tx.len())
            .field("total_tasks", &self.total.get())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn dispatch_loop(shared: &PoolShared) {
    debug!(size = shared.size, "dispatch loop started");

    loop {
        select! {
            recv(shared.token.done()) -> _ => break,
            recv(shared.submit_rx) -> task => {
                // The pool handle owns the sender; it never drops first.
                let Ok(task) = task else { break };
                let Some(worker) = shared.free.claim_idle(&shared.idle_rx, &shared.token) else {
                    trace!("pool stopped while waiting for an idle worker, task dropped");
                    break;
                };
                trace!(worker = worker.name(), "dispatching task");
                worker.submit_task(task);
            }
        }
    }

    shared.drain();
    debug!("dispatch loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    fn config(size: usize, parallelism: usize) -> PoolConfig {
        PoolConfig::new().size(size).parallelism(parallelism)
    }

    #[test]
    fn test_rejects_size_at_parallelism() {
        let root = CancellationToken::new();
        let err = ThreadPool::with_config(&root, config(4, 4)).unwrap_err();
        assert!(matches!(
            err,
            PoolError::Capacity { requested: 4, available: 4 }
        ));
    }

    #[test]
    fn test_rejects_zero_size() {
        let root = CancellationToken::new();
        let err = ThreadPool::with_config(&root, config(0, 4)).unwrap_err();
        assert!(matches!(err, PoolError::Capacity { requested: 0, .. }));
    }

    #[test]
    fn test_new_checks_host_parallelism() {
        let root = CancellationToken::new();
        let host = crate::config::detected_parallelism();
        assert!(matches!(
            ThreadPool::new(&root, host),
            Err(PoolError::Capacity { .. })
        ));
        assert!(matches!(
            ThreadPool::new(&root, host + 1),
            Err(PoolError::Capacity { .. })
        ));
    }

    #[test]
    fn test_creates_exactly_n_started_workers() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(3, 8).thread_name("n")).unwrap();

        assert_eq!(pool.size(), 3);
        assert_eq!(pool.shared.free.capacity(), 3);
        assert_eq!(pool.shared.free.available(), 3);

        let mut names: Vec<String> = (0..3)
            .map(|_| {
                let lease = pool.shared.free.claim();
                assert!(lease.state().is_running());
                lease.name().to_string()
            })
            .collect();
        names.sort();
        assert_eq!(names, ["n-0", "n-1", "n-2"]);
    }

    #[test]
    fn test_two_workers_each_send_once() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(2, 4)).unwrap();
        pool.start().unwrap();

        let (tx, rx) = mpsc::channel();
        for _ in 0..2 {
            let tx = tx.clone();
            pool.exec(move || tx.send(1).unwrap());
        }
        drop(tx);

        let got: Vec<i32> = rx.iter().take(2).collect();
        assert_eq!(got, [1, 1]);

        pool.stop();
        pool.join();
        assert_eq!(pool.total_tasks(), 2);
    }

    #[test]
    fn test_exec_after_stop_is_dropped() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(1, 4)).unwrap();
        pool.start().unwrap();
        pool.stop();
        pool.join();

        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        pool.exec(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parent_cancel_stops_pool() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(2, 4)).unwrap();
        pool.start().unwrap();

        root.cancel();
        pool.join();

        assert!(pool.is_cancelled());
        for _ in 0..2 {
            assert!(pool.shared.free.claim().is_finished());
        }
    }

    #[test]
    fn test_drop_without_start_joins_workers() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(2, 4)).unwrap();
        let tokens: Vec<_> = (0..2)
            .map(|_| pool.shared.free.claim().token().clone())
            .collect();

        drop(pool);

        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_queued_task_goes_to_first_worker_to_free_up() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(2, 4)).unwrap();
        pool.start().unwrap();

        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (tx, rx) = mpsc::channel();

        let short = tx.clone();
        pool.exec(move || {
            thread::sleep(Duration::from_millis(50));
            short.send(thread::current().name().map(str::to_owned)).unwrap();
        });
        pool.exec(move || {
            let _ = gate_rx.recv();
        });
        pool.exec(move || tx.send(thread::current().name().map(str::to_owned)).unwrap());

        let short_ran_on = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let third_ran_on = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(third_ran_on, short_ran_on);

        drop(gate_tx);
        pool.stop();
        pool.join();
    }

    #[test]
    fn test_stop_while_all_workers_busy() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(1, 4)).unwrap();
        pool.start().unwrap();

        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        pool.exec(move || {
            started_tx.send(()).unwrap();
            let _ = gate_rx.recv();
        });
        started_rx.recv().unwrap();

        // Held by the dispatcher, waiting for an idle worker.
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        pool.exec(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(20));

        pool.stop();
        drop(gate_tx);
        pool.join();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(pool.shared.free.claim().is_finished());
    }

    #[test]
    fn test_second_start_is_ignored() {
        let root = CancellationToken::new();
        let pool = ThreadPool::with_config(&root, config(1, 4)).unwrap();
        pool.start().unwrap();
        pool.start().unwrap();

        let (tx, rx) = mpsc::channel();
        pool.exec(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
