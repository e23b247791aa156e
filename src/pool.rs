//! Process-wide worker pool shared by every parallel pipeline.

use crate::config::EngineConfig;
use crate::error::{Result, SequenceError};
use lazy_static::lazy_static;
use rayon::{ThreadPool, ThreadPoolBuilder};

lazy_static! {
    static ref WORKER_POOL: std::result::Result<ThreadPool, String> =
        build_pool(EngineConfig::global());
}

fn build_pool(config: &EngineConfig) -> std::result::Result<ThreadPool, String> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|index| format!("seqflow-worker-{index}"))
        .build()
        .map_err(|err| err.to_string())?;
    tracing::info!(workers = config.workers, "worker pool started");
    Ok(pool)
}

/// Returns the shared pool, building it on first call.
pub fn worker_pool() -> Result<&'static ThreadPool> {
    WORKER_POOL
        .as_ref()
        .map_err(|reason| SequenceError::WorkerPool(reason.clone()))
}
