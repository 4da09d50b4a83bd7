//! Pinned-thread worker
//!
//! A worker owns exactly one OS thread for its whole life. Closures handed
//! to it run on that thread, one at a time, in the order they were accepted.
//!
//! ```text
//!   submit(f) ──► [rendezvous slot] ──► worker thread: run f, in_flight -= 1
//!                                          ▲
//!   stop()/join() ── cancel token ─────────┘ (checked between closures)
//! ```
//!
//! Workers are usable on their own or as members of a [`ThreadPool`](crate::ThreadPool).

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{select, Receiver, Sender};
use osthread_core::{
    AtomicWorkerState, CancellationToken, InFlight, PoolResult, Task, TaskCounter, WorkerState,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::affinity::{CpuAffinity, PlatformAffinity};

const DEFAULT_WORKER_NAME: &str = "osthread-worker";

/// Per-worker thread settings
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// OS thread name
    pub name: Option<String>,
    /// Stack size in bytes, `None` for the platform default
    pub stack_size: Option<usize>,
    /// CPU core to pin the thread to
    pub core: Option<usize>,
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn core(mut self, cpu: usize) -> Self {
        self.core = Some(cpu);
        self
    }
}

/// State shared between the worker handle and its thread
struct WorkerShared {
    name: String,
    /// Zero-capacity: a send completes only when the loop takes the closure.
    slot_tx: Sender<Task>,
    slot_rx: Receiver<Task>,
    token: CancellationToken,
    in_flight: InFlight,
    /// Pool-wide total, bumped once per accepted handoff
    total: Option<TaskCounter>,
    /// Pool-wide idle signal, pinged when in-flight drops to zero
    idle: Option<Sender<()>>,
    state: AtomicWorkerState,
}

/// A single dedicated OS thread that runs submitted closures serially
///
/// # Lifecycle
///
/// `Created` ─[`start`](Self::start)→ `Running` ─(cancellation)→ `Stopped`.
/// Stopped is terminal.
///
/// # Shutdown
///
/// - [`join`](Self::join) waits for in-flight work, then cancels and waits
///   for the thread to exit.
/// - [`stop`](Self::stop) cancels immediately. A closure already running
///   finishes; nothing new is accepted.
///
/// Callers must stop submitting before calling `join` if they want a clean
/// drain; a `submit` racing with `join` may or may not be accepted.
///
/// `join` may be called from several threads at once; every call returns
/// only after the worker thread has exited. Called from a closure running on
/// this worker, `join` cancels and returns without waiting.
pub struct Worker {
    shared: Arc<WorkerShared>,
    config: WorkerConfig,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: OnceLock<ThreadId>,
    /// Disconnects when the worker thread exits
    exited: Mutex<Option<Receiver<()>>>,
}

impl Worker {
    /// Create a worker whose token is a child of `parent`
    ///
    /// `total`, when given, is incremented on every handoff this worker
    /// accepts. Nothing runs until [`start`](Self::start).
    pub fn new(parent: &CancellationToken, total: Option<TaskCounter>) -> Self {
        Self::with_config(parent, total, WorkerConfig::default())
    }

    /// Create a worker with explicit thread settings
    pub fn with_config(
        parent: &CancellationToken,
        total: Option<TaskCounter>,
        config: WorkerConfig,
    ) -> Self {
        Self::build(parent, total, config, None)
    }

    /// Pool member: also pings `idle` whenever it runs out of work
    pub(crate) fn pooled(
        parent: &CancellationToken,
        total: TaskCounter,
        config: WorkerConfig,
        idle: Sender<()>,
    ) -> Self {
        Self::build(parent, Some(total), config, Some(idle))
    }

    fn build(
        parent: &CancellationToken,
        total: Option<TaskCounter>,
        config: WorkerConfig,
        idle: Option<Sender<()>>,
    ) -> Self {
        let (slot_tx, slot_rx) = crossbeam_channel::bounded(0);
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_WORKER_NAME.to_string());

        Self {
            shared: Arc::new(WorkerShared {
                name,
                slot_tx,
                slot_rx,
                token: parent.child(),
                in_flight: InFlight::new(),
                total,
                idle,
                state: AtomicWorkerState::new(WorkerState::Created),
            }),
            config,
            thread: Mutex::new(None),
            thread_id: OnceLock::new(),
            exited: Mutex::new(None),
        }
    }

    /// Spawn the worker's OS thread and start its loop
    ///
    /// Only the first call spawns; later calls (or a call after `stop`) are
    /// logged and ignored.
    pub fn start(&self) -> PoolResult<()> {
        let mut thread_slot = self.thread.lock();

        if !self
            .shared
            .state
            .transition(WorkerState::Created, WorkerState::Running)
        {
            warn!(worker = %self.shared.name, state = %self.state(), "worker start ignored");
            return Ok(());
        }

        let mut builder = thread::Builder::new().name(self.shared.name.clone());
        if let Some(bytes) = self.config.stack_size {
            builder = builder.stack_size(bytes);
        }

        let shared = Arc::clone(&self.shared);
        let core = self.config.core;
        let (exit_tx, exit_rx) = crossbeam_channel::bounded::<()>(0);
        let spawned = builder.spawn(move || {
            let _exited = exit_tx;
            worker_loop(&shared, core);
        });

        match spawned {
            Ok(handle) => {
                let _ = self.thread_id.set(handle.thread().id());
                *self.exited.lock() = Some(exit_rx);
                *thread_slot = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.state.store(WorkerState::Created);
                Err(err.into())
            }
        }
    }

    /// Hand `f` to the worker, blocking until its loop accepts it
    ///
    /// Returns once the handoff happens, not when `f` finishes. If the
    /// worker is cancelled before accepting, `f` is dropped unrun.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_task(Box::new(f));
    }

    pub(crate) fn submit_task(&self, task: Task) {
        let shared = &*self.shared;
        shared.in_flight.increment();

        if shared.token.is_cancelled() {
            shared.in_flight.decrement();
            trace!(worker = %shared.name, "worker cancelled, task dropped");
            return;
        }

        let accepted = select! {
            send(shared.slot_tx, task) -> res => res.is_ok(),
            recv(shared.token.done()) -> _ => false,
        };

        if accepted {
            if let Some(total) = &shared.total {
                total.increment();
            }
        } else {
            shared.in_flight.decrement();
            trace!(worker = %shared.name, "worker cancelled during handoff, task dropped");
        }
    }

    /// Graceful shutdown
    ///
    /// Waits for the in-flight count to reach zero, cancels, then waits for
    /// the OS thread to exit. From a closure running on this worker it only
    /// cancels, since waiting there would wait on itself.
    pub fn join(&self) {
        if self.on_worker_thread() {
            self.shared.token.cancel();
            debug!(worker = %self.shared.name, "join from worker thread, cancelled without waiting");
            return;
        }

        self.shared.in_flight.wait_idle();
        self.shared.token.cancel();
        self.shared
            .state
            .transition(WorkerState::Created, WorkerState::Stopped);
        self.join_thread();
        debug!(worker = %self.shared.name, "worker joined");
    }

    /// Hard shutdown: cancel without waiting
    pub fn stop(&self) {
        self.shared.token.cancel();
        self.shared
            .state
            .transition(WorkerState::Created, WorkerState::Stopped);
        debug!(worker = %self.shared.name, in_flight = self.in_flight(), "worker stopped");
    }

    fn on_worker_thread(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }

    fn join_thread(&self) {
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                // Tasks run under catch_unwind, so only the loop itself could get here.
                warn!(worker = %self.shared.name, "worker thread panicked");
            }
            return;
        }

        // Another join owns the handle; wait for the thread to drop its sender.
        let exited = self.exited.lock().clone();
        if let Some(exited) = exited {
            let _ = exited.recv();
        }
    }

    /// OS thread name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state.load()
    }

    /// Closures submitted but not yet finished (0 or 1 under normal use)
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.get()
    }

    /// Whether the worker loop has exited
    pub fn is_finished(&self) -> bool {
        self.state().is_terminated()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.shared.token
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Detach rather than block; the thread exits at its next check.
        self.shared.token.cancel();
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .field("core", &self.config.core)
            .finish_non_exhaustive()
    }
}

fn worker_loop(shared: &WorkerShared, core: Option<usize>) {
    if let Some(cpu) = core {
        match PlatformAffinity::pin_current_thread(cpu) {
            Ok(()) => debug!(worker = %shared.name, cpu, "worker pinned to cpu"),
            Err(err) => warn!(worker = %shared.name, cpu, %err, "cpu pinning failed, running unpinned"),
        }
    }

    debug!(worker = %shared.name, "worker thread started");

    loop {
        if shared.token.is_cancelled() {
            break;
        }

        select! {
            recv(shared.token.done()) -> _ => break,
            recv(shared.slot_rx) -> task => {
                // The handle keeps a sender alive, so this never disconnects.
                let Ok(task) = task else { break };
                run_task(shared, task);
            }
        }
    }

    shared.state.store(WorkerState::Stopped);
    debug!(worker = %shared.name, "worker thread exiting");
}

fn run_task(shared: &WorkerShared, task: Task) {
    trace!(worker = %shared.name, "running task");

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        warn!(
            worker = %shared.name,
            panic = panic_message(payload.as_ref()),
            "task panicked, worker thread kept alive"
        );
    }

    if shared.in_flight.decrement() {
        if let Some(idle) = &shared.idle {
            // A full channel already has a wakeup pending.
            let _ = idle.try_send(());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
