//! CPU affinity for worker threads
//!
//! Every worker already owns a dedicated OS thread. When core pinning is
//! enabled the thread additionally asks the OS to keep it on one CPU, so
//! its caches and any thread-local state a library hangs off it stay put.

use std::io;

/// Platform-specific CPU affinity operations
pub trait CpuAffinity {
    /// CPUs the current process may run on, in ascending order
    fn allowed_cpus() -> io::Result<Vec<usize>>;

    /// Restrict the calling thread to `cpu`
    fn pin_current_thread(cpu: usize) -> io::Result<()>;
}

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod linux;
        pub use linux::LinuxAffinity as PlatformAffinity;
    } else {
        mod fallback;
        pub use fallback::FallbackAffinity as PlatformAffinity;
    }
}

/// Pick the CPU for worker `index`
///
/// The first allowed CPU is left to the host; workers take the following
/// ones in order, wrapping if the allowed set is smaller than the pool.
pub fn core_for_worker(allowed: &[usize], index: usize) -> Option<usize> {
    if allowed.is_empty() {
        return None;
    }
    allowed.get((index + 1) % allowed.len()).copied()
}
