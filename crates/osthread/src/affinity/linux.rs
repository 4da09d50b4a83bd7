//! Linux affinity via sched_setaffinity(2)

use std::io;

use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use super::CpuAffinity;

/// `sched_{get,set}affinity` backend
pub struct LinuxAffinity;

impl CpuAffinity for LinuxAffinity {
    fn allowed_cpus() -> io::Result<Vec<usize>> {
        // Pid 0 is the calling thread.
        let set = sched_getaffinity(Pid::from_raw(0))?;
        let mut cpus = Vec::new();
        for cpu in 0..CpuSet::count() {
            if set.is_set(cpu)? {
                cpus.push(cpu);
            }
        }
        Ok(cpus)
    }

    fn pin_current_thread(cpu: usize) -> io::Result<()> {
        let mut set = CpuSet::new();
        set.set(cpu)?;
        sched_setaffinity(Pid::from_raw(0), &set)?;
        Ok(())
    }
}
