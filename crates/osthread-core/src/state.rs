//! Worker lifecycle state

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a worker
///
/// `Created -> Running -> Stopped`. Stopped is terminal; there is no restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Constructed, no thread yet
    Created = 0,

    /// Thread spawned, loop accepting work
    Running = 1,

    /// Loop exited after cancellation
    Stopped = 2,
}

impl WorkerState {
    #[inline]
    pub const fn is_running(&self) -> bool {
        matches!(self, WorkerState::Running)
    }

    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }
}

impl From<WorkerState> for u8 {
    fn from(state: WorkerState) -> u8 {
        state as u8
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Atomic cell holding a [`WorkerState`]
#[derive(Debug)]
pub struct AtomicWorkerState(AtomicU8);

impl AtomicWorkerState {
    pub const fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn load(&self) -> WorkerState {
        WorkerState::from(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, state: WorkerState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Move from `from` to `to`; returns false if the current state was not `from`
    #[inline]
    pub fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.0
            .compare_exchange(from.into(), to.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
