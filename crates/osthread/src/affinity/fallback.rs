//! Fallback for platforms without a thread affinity API wired up
//!
//! Workers still get dedicated threads; only the CPU restriction is missing.

use std::io;
use std::thread;

use super::CpuAffinity;

pub struct FallbackAffinity;

impl CpuAffinity for FallbackAffinity {
    fn allowed_cpus() -> io::Result<Vec<usize>> {
        let n = thread::available_parallelism()?.get();
        Ok((0..n).collect())
    }

    fn pin_current_thread(_cpu: usize) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "thread affinity is not supported on this platform",
        ))
    }
}
