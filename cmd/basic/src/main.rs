//! Basic osthread example
//!
//! Builds a pool from the environment, fans a batch of closures out over it,
//! shows which OS thread ran each one, then shuts down gracefully.
//!
//! # Environment Variables
//!
//! - `RUST_LOG=osthread=debug` - Log filter (default: `info`)
//! - `OSTHREAD_POOL_SIZE=2` - Number of workers
//! - `OSTHREAD_PIN_CORES=1` - Pin each worker to its own CPU
//! - `OSTHREAD_THREAD_NAME=demo` - Worker thread name prefix

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use osthread::{CancellationToken, PoolConfig, PoolError, ThreadPool};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TASKS: usize = 16;

// RUST_LOG=debug OSTHREAD_PIN_CORES=1 cargo run -p osthread-basic
fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_thread_names(true)
        .with_target(false)
        .init();

    let config = PoolConfig::from_env();
    info!(
        size = config.size,
        parallelism = config.parallelism,
        pin_cores = config.pin_cores,
        "starting pool"
    );

    let root = CancellationToken::new();
    let pool = ThreadPool::with_config(&root, config)?;
    pool.start()?;

    let (tx, rx) = mpsc::channel();
    let start = Instant::now();

    for i in 0..TASKS {
        let tx = tx.clone();
        pool.exec(move || {
            std::thread::sleep(Duration::from_millis(10));
            let name = std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string();
            let _ = tx.send((i, name));
        });
    }
    drop(tx);

    let mut per_thread: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for _ in 0..TASKS {
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok((i, name)) => per_thread.entry(name).or_default().push(i),
            Err(err) => {
                warn!(%err, "gave up waiting for tasks");
                break;
            }
        }
    }

    for (thread, tasks) in &per_thread {
        info!(thread = %thread, count = tasks.len(), ?tasks, "tasks per worker thread");
    }

    pool.stop();
    pool.join();

    info!(
        dispatched = pool.total_tasks(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pool stopped"
    );

    Ok(())
}
