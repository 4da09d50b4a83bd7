//! # osthread - Pinned OS Thread Pool
//!
//! A fixed-size pool of dedicated OS threads. Every worker owns one thread
//! for its whole life, so work handed to a given worker always runs on the
//! same OS thread. Useful for libraries with thread-affinity requirements
//! that must not run on a general-purpose scheduler's threads.
//!
//! ## Features
//!
//! - **Dedicated threads**: one OS thread per worker, never shared
//! - **Optional core pinning**: workers can be restricted to one CPU each
//! - **Lease-based dispatch**: a bounded free-list hands each closure to an idle worker
//! - **Backpressure**: `exec` blocks once N closures are queued
//! - **Cooperative shutdown**: graceful `join` or hard `stop`, driven by
//!   parent/child cancellation tokens
//!
//! ## Quick Start
//!
//! ```ignore
//! use osthread::{CancellationToken, ThreadPool};
//!
//! fn main() -> Result<(), osthread::PoolError> {
//!     let root = CancellationToken::new();
//!     let pool = ThreadPool::new(&root, 2)?;
//!     pool.start()?;
//!
//!     pool.exec(|| println!("hello from a dedicated thread"));
//!
//!     pool.stop();
//!     pool.join();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        User Code                            │
//! │                 exec(), stop(), join()                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ bounded channel (N)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Dispatch Thread                         │
//! │          claim worker ─ submit ─ release (free-list)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ rendezvous
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │  Worker   │
//!    │ OS thread │      │ OS thread │      │ OS thread │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

pub mod affinity;
pub mod config;
mod free_list;
pub mod pool;
pub mod worker;

pub use config::PoolConfig;
pub use pool::ThreadPool;
pub use worker::{Worker, WorkerConfig};

// Re-export core types
pub use osthread_core::{
    CancellationToken,
    PoolError,
    PoolResult,
    Task,
    TaskCounter,
    WorkerState,
};

// Re-export env utilities
pub use osthread_core::{env_get, env_get_bool, env_get_opt, env_get_str};
