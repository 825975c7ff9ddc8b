//! Registry of polled callbacks.
//!
//! Registration is copy-on-write through `ArcSwap`, so a rotation works on a
//! stable snapshot while new callbacks are added concurrently. A callback
//! registered during a rotation runs from the next rotation on.

use crate::polling::{DispatchPolicy, PollingExecutor};
use crate::rotation::RotationStats;
use crate::sink::{NonClosingSink, Sink};
use arc_swap::ArcSwap;
use crossbeam::sync::WaitGroup;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A user callback invoked once per rotation with a view of the current sink
pub type PolledCallback = Arc<dyn Fn(&NonClosingSink) -> anyhow::Result<()> + Send + Sync>;

/// Outcome of dispatching the registered callbacks for one rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Callbacks handed to the executor
    pub dispatched: usize,
    /// Callbacks that failed, known only when completion was awaited
    pub failed: Option<usize>,
}

/// Concurrent collection of polled callbacks
pub struct PolledCallbackRegistry {
    callbacks: ArcSwap<Vec<PolledCallback>>,
}

impl PolledCallbackRegistry {
    pub fn new() -> Self {
        Self {
            callbacks: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Add a callback. Duplicates are kept and run independently.
    pub fn register(&self, callback: PolledCallback) {
        self.callbacks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&callback));
            next
        });
    }

    /// Callbacks registered at this instant
    pub fn snapshot(&self) -> Arc<Vec<PolledCallback>> {
        self.callbacks.load_full()
    }

    pub fn len(&self) -> usize {
        self.callbacks.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.load().is_empty()
    }

    /// Dispatch every registered callback against `sink`.
    ///
    /// Each invocation gets its own [`NonClosingSink`] over `sink` and is
    /// isolated: an error or panic is logged and counted, and never reaches
    /// other callbacks or the caller. With [`DispatchPolicy::AwaitCompletion`]
    /// this returns only after every invocation finished or was dropped by
    /// the executor.
    pub fn poll(
        &self,
        sink: &Arc<dyn Sink>,
        executor: &dyn PollingExecutor,
        policy: DispatchPolicy,
        stats: &Arc<RotationStats>,
    ) -> PollReport {
        let callbacks = self.snapshot();
        if callbacks.is_empty() {
            return PollReport {
                dispatched: 0,
                failed: Some(0),
            };
        }

        let failures = Arc::new(AtomicUsize::new(0));
        let wait_group = WaitGroup::new();

        for callback in callbacks.iter() {
            let callback = Arc::clone(callback);
            let view = NonClosingSink::new(Arc::clone(sink));
            let failures = Arc::clone(&failures);
            let stats = Arc::clone(stats);
            let done = wait_group.clone();

            executor.execute(Box::new(move || {
                if !invoke_isolated(&callback, &view) {
                    failures.fetch_add(1, Ordering::Relaxed);
                    stats.record_callback_failure();
                }
                drop(done);
            }));
        }
        stats.record_dispatched(callbacks.len());

        match policy {
            DispatchPolicy::AwaitCompletion => {
                wait_group.wait();
                PollReport {
                    dispatched: callbacks.len(),
                    failed: Some(failures.load(Ordering::Relaxed)),
                }
            },
            DispatchPolicy::FireAndForget => PollReport {
                dispatched: callbacks.len(),
                failed: None,
            },
        }
    }
}

impl Default for PolledCallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolledCallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolledCallbackRegistry")
            .field("callbacks", &self.len())
            .finish()
    }
}

/// Run one callback, containing both error returns and panics
fn invoke_isolated(callback: &PolledCallback, view: &NonClosingSink) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(view))) {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            tracing::warn!(error = %error, "Polled metric callback failed");
            false
        },
        Err(payload) => {
            tracing::error!(panic = panic_message(payload.as_ref()), "Polled metric callback panicked");
            false
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
