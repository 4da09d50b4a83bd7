//! Error types for the osthread pool

use std::io;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while building or starting a pool or worker
///
/// Nothing submitted to a running pool ever produces one of these; a failing
/// closure is the closure's own business.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Requested pool size is zero or leaves no thread for the host
    #[error("pool size {requested} is out of range: must be at least 1 and less than available parallelism ({available})")]
    Capacity { requested: usize, available: usize },

    /// The OS refused to create a thread
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),
}
