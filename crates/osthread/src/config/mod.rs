//! Pool configuration
//!
//! Provides library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables (`from_env`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use osthread::PoolConfig;
//!
//! // Defaults with env overrides
//! let config = PoolConfig::from_env();
//!
//! // Or customize programmatically
//! let config = PoolConfig::new().size(2).pin_cores(true);
//! ```

pub mod defaults;

use osthread_core::env::{env_get, env_get_bool, env_get_opt, env_get_str};

/// Host parallelism as reported by the OS
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(defaults::FALLBACK_PARALLELISM)
}

/// Thread pool configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers (N). Must satisfy `1 <= size < parallelism`.
    pub size: usize,
    /// Ceiling for `size`; defaults to the host's available parallelism
    pub parallelism: usize,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Worker stack size in bytes, `None` for the platform default
    pub stack_size: Option<usize>,
    /// Pin each worker thread to a CPU core
    pub pin_cores: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Create config from library defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `OSTHREAD_POOL_SIZE` - Number of workers
    /// - `OSTHREAD_PARALLELISM` - Override the detected host parallelism
    /// - `OSTHREAD_THREAD_NAME` - Worker thread name prefix
    /// - `OSTHREAD_STACK_SIZE` - Worker stack size in bytes (0 = default)
    /// - `OSTHREAD_PIN_CORES` - Pin workers to CPU cores (0/1)
    pub fn from_env() -> Self {
        let parallelism = env_get("OSTHREAD_PARALLELISM", detected_parallelism());
        let size = env_get_opt("OSTHREAD_POOL_SIZE").unwrap_or_else(|| max_size(parallelism));
        let stack_size = env_get("OSTHREAD_STACK_SIZE", defaults::STACK_SIZE);

        Self {
            size,
            parallelism,
            thread_name: env_get_str("OSTHREAD_THREAD_NAME", defaults::THREAD_NAME),
            stack_size: (stack_size > 0).then_some(stack_size),
            pin_cores: env_get_bool("OSTHREAD_PIN_CORES", defaults::PIN_CORES),
        }
    }

    /// Create config with library defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        let parallelism = detected_parallelism();
        Self {
            size: max_size(parallelism),
            parallelism,
            thread_name: defaults::THREAD_NAME.to_string(),
            stack_size: None,
            pin_cores: defaults::PIN_CORES,
        }
    }

    // Builder methods

    pub fn size(mut self, n: usize) -> Self {
        self.size = n;
        self
    }

    pub fn parallelism(mut self, n: usize) -> Self {
        self.parallelism = n;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn pin_cores(mut self, enable: bool) -> Self {
        self.pin_cores = enable;
        self
    }

    /// Whether `size` leaves at least one thread of parallelism to the host
    pub fn is_valid_size(&self) -> bool {
        self.size >= 1 && self.size < self.parallelism
    }
}

/// Largest pool that still leaves one thread to the host (at least 1)
fn max_size(parallelism: usize) -> usize {
    parallelism.saturating_sub(1).max(1)
}
