//! Rotation activity counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters describing what the recorder has done so far
#[derive(Debug, Default)]
pub struct RotationStats {
    rotations: AtomicU64,
    sinks_created: AtomicU64,
    callbacks_dispatched: AtomicU64,
    callback_failures: AtomicU64,
    last_rotation_micros: AtomicU64,
}

/// Point-in-time copy of [`RotationStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RotationStatsSnapshot {
    pub rotations: u64,
    pub sinks_created: u64,
    pub callbacks_dispatched: u64,
    pub callback_failures: u64,
    pub last_rotation_micros: u64,
}

impl RotationStats {
    #[inline]
    pub fn record_sink_created(&self) {
        self.sinks_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dispatched(&self, callbacks: usize) {
        self.callbacks_dispatched
            .fetch_add(callbacks as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self, elapsed: Duration) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_rotation_micros.store(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RotationStatsSnapshot {
        RotationStatsSnapshot {
            rotations: self.rotations.load(Ordering::Relaxed),
            sinks_created: self.sinks_created.load(Ordering::Relaxed),
            callbacks_dispatched: self.callbacks_dispatched.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            last_rotation_micros: self.last_rotation_micros.load(Ordering::Relaxed),
        }
    }
}
