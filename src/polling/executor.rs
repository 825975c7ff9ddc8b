//! Execution contexts for polled callbacks.
//!
//! Anything from "run inline on the rotating thread" to "run on a worker
//! pool" works; the rotation only relies on each task eventually running or
//! being dropped.

use crate::core::{PeriodicError, Result};
use std::fmt;

/// Unit of work handed to an executor
pub type PollTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs polled callback tasks.
///
/// An executor may drop a task without running it (for example while shutting
/// down). An awaiting rotation treats a dropped task as finished.
pub trait PollingExecutor: Send + Sync {
    /// Run or schedule `task`.
    fn execute(&self, task: PollTask);

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Runs every task immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl PollingExecutor for InlineExecutor {
    #[inline]
    fn execute(&self, task: PollTask) {
        task();
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

/// Runs tasks on a dedicated rayon thread pool.
///
/// Do not call an awaiting rotation from inside this pool: with few threads
/// the rotation can occupy the worker its own callbacks need.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build a pool with `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(PeriodicError::executor("rayon executor needs at least one thread"));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("periodic-poll-{}", index))
            .panic_handler(|_| tracing::error!("Polled metrics task panicked on rayon pool"))
            .build()
            .map_err(|e| PeriodicError::executor(format!("Failed to build rayon pool: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl PollingExecutor for RayonExecutor {
    fn execute(&self, task: PollTask) {
        self.pool.spawn(task);
    }

    fn name(&self) -> &'static str {
        "rayon"
    }
}

impl fmt::Debug for RayonExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RayonExecutor")
            .field("threads", &self.threads())
            .finish()
    }
}

/// Runs tasks on a tokio runtime's blocking pool
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime of the calling context
    pub fn current() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| PeriodicError::executor(format!("No tokio runtime available: {}", e)))?;
        Ok(Self::new(handle))
    }
}

impl PollingExecutor for TokioExecutor {
    fn execute(&self, task: PollTask) {
        // Detached; completion is tracked by the task itself
        drop(self.handle.spawn_blocking(task));
    }

    fn name(&self) -> &'static str {
        "tokio"
    }
}
