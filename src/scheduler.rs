//! Periodic rotation trigger on a tokio runtime.
//!
//! The recorder itself has no notion of time. [`RotationScheduler`] calls
//! [`PeriodicRecorder::rotate`] once per period from a single background task,
//! so rotations it triggers never overlap. Shutting the handle down stops the
//! loop and, unless disabled, forces one last rotation so the partial interval
//! is flushed.

use crate::core::{PeriodicError, Result, DEFAULT_ROTATION_INTERVAL};
use crate::rotation::PeriodicRecorder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Configures and starts the rotation loop
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    period: Duration,
    final_flush: bool,
}

impl RotationScheduler {
    /// Scheduler rotating every `period`. A zero period is rejected.
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(PeriodicError::config("Rotation period must be greater than zero"));
        }

        Ok(Self {
            period,
            final_flush: true,
        })
    }

    /// Whether shutdown forces a final rotation (default: true)
    pub fn final_flush(mut self, enabled: bool) -> Self {
        self.final_flush = enabled;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start rotating `recorder` on the current tokio runtime.
    ///
    /// The first rotation happens one full period after this call.
    pub fn spawn(self, recorder: Arc<PeriodicRecorder>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let triggered = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_loop(
            Arc::clone(&recorder),
            self.period,
            shutdown_rx,
            flush_rx,
            Arc::clone(&triggered),
        ));

        tracing::info!(period = ?self.period, final_flush = self.final_flush, "Rotation scheduler started");

        SchedulerHandle {
            recorder,
            shutdown_tx,
            flush_tx,
            task,
            triggered,
            final_flush: self.final_flush,
        }
    }
}

impl Default for RotationScheduler {
    fn default() -> Self {
        Self {
            period: DEFAULT_ROTATION_INTERVAL,
            final_flush: true,
        }
    }
}

/// Control handle for a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    recorder: Arc<PeriodicRecorder>,
    shutdown_tx: watch::Sender<bool>,
    flush_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
    triggered: Arc<AtomicU64>,
    final_flush: bool,
}

impl SchedulerHandle {
    /// Rotations performed by the loop so far, the final flush excluded
    pub fn rotations_triggered(&self) -> u64 {
        self.triggered.load(Ordering::Relaxed)
    }

    /// Ask the loop for an immediate rotation.
    ///
    /// The periodic schedule is unchanged. Fails if the loop is no longer
    /// running.
    pub fn flush_now(&self) -> Result<()> {
        self.flush_tx
            .send(())
            .map_err(|_| PeriodicError::SchedulerStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop, wait for it, then run the final flush if enabled
    pub async fn shutdown(self) -> Result<()> {
        // The loop may already be gone; joining below reports why
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.task.await {
            tracing::error!("Rotation scheduler task failed: {}", e);
            return Err(e.into());
        }

        if self.final_flush {
            let recorder = Arc::clone(&self.recorder);
            tokio::task::spawn_blocking(move || recorder.rotate()).await?;
            tracing::debug!("Final rotation flushed");
        }

        tracing::info!(
            rotations = self.triggered.load(Ordering::Relaxed),
            "Rotation scheduler stopped"
        );
        Ok(())
    }
}

async fn run_loop(
    recorder: Arc<PeriodicRecorder>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut flush_requests: mpsc::UnboundedReceiver<()>,
    triggered: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                rotate_blocking(&recorder, &triggered).await;
            }
            Some(()) = flush_requests.recv() => {
                rotate_blocking(&recorder, &triggered).await;
            }
        }
    }
}

async fn rotate_blocking(recorder: &Arc<PeriodicRecorder>, triggered: &AtomicU64) {
    let recorder = Arc::clone(recorder);
    match tokio::task::spawn_blocking(move || recorder.rotate()).await {
        Ok(()) => {
            triggered.fetch_add(1, Ordering::Relaxed);
        },
        Err(e) => tracing::error!("Rotation task failed: {}", e),
    }
}
