//! # osthread-core
//!
//! Platform-agnostic building blocks for the osthread pool.
//!
//! ## Modules
//!
//! - `cancel` - Parent/child cancellation tokens with a waitable done signal
//! - `counter` - Per-worker in-flight counter and shared task totals
//! - `state` - Worker lifecycle state
//! - `error` - Error types
//! - `env` - Environment variable helpers

pub mod cancel;
pub mod counter;
pub mod env;
pub mod error;
pub mod state;

pub use cancel::CancellationToken;
pub use counter::{InFlight, TaskCounter};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};
pub use error::{PoolError, PoolResult};
pub use state::{AtomicWorkerState, WorkerState};

/// A unit of work: a side-effecting closure with no result channel
pub type Task = Box<dyn FnOnce() + Send + 'static>;
