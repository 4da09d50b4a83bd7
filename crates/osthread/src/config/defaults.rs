//! Library defaults, overridable through `OSTHREAD_*` environment variables

/// Worker thread name prefix; workers are named `{prefix}-{index}`
pub const THREAD_NAME: &str = "osthread";

/// Stack size for worker threads, 0 meaning the platform default
pub const STACK_SIZE: usize = 0;

/// Pin each worker to its own CPU core
pub const PIN_CORES: bool = false;

/// Parallelism assumed when the host cannot report it
pub const FALLBACK_PARALLELISM: usize = 1;
