//! In-memory reference sink.
//!
//! Accumulates one interval in concurrent maps and, when closed, hands an
//! [`IntervalSnapshot`] to a [`FlushListener`]. This is the sink the recorder
//! falls back to when no factory is configured.

use crate::sink::{GaugeValue, Sink, SinkFactory, TimeUnit, Unit};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A single timer sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerSample {
    pub value: i64,
    pub unit: Option<TimeUnit>,
}

/// Latest reading of a gauge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeReading {
    pub value: GaugeValue,
    pub unit: Option<Unit>,
}

/// Everything a sink accumulated during its interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSnapshot {
    pub sink_id: u64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub counters: BTreeMap<String, i64>,
    pub timers: BTreeMap<String, Vec<TimerSample>>,
    pub gauges: BTreeMap<String, GaugeReading>,
    pub annotations: BTreeMap<String, String>,
}

impl IntervalSnapshot {
    /// Value of a counter, if it was touched this interval
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// Total number of samples across counters, timers and gauges
    pub fn sample_count(&self) -> usize {
        self.counters.len() + self.timers.values().map(Vec::len).sum::<usize>() + self.gauges.len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0 && self.annotations.is_empty()
    }
}

/// Receives the snapshot of every sink when it is closed.
pub trait FlushListener: Send + Sync {
    fn on_flush(&self, snapshot: IntervalSnapshot);
}

impl<F> FlushListener for F
where
    F: Fn(IntervalSnapshot) + Send + Sync,
{
    fn on_flush(&self, snapshot: IntervalSnapshot) {
        self(snapshot);
    }
}

/// Emits flushed intervals through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl FlushListener for LoggingListener {
    fn on_flush(&self, snapshot: IntervalSnapshot) {
        tracing::debug!(
            sink_id = snapshot.sink_id,
            counters = snapshot.counters.len(),
            timers = snapshot.timers.len(),
            gauges = snapshot.gauges.len(),
            "Interval flushed"
        );

        if tracing::enabled!(tracing::Level::TRACE) {
            match serde_json::to_string(&snapshot) {
                Ok(json) => tracing::trace!(sink_id = snapshot.sink_id, "{}", json),
                Err(e) => tracing::warn!("Failed to serialize interval snapshot: {}", e),
            }
        }
    }
}

/// Sink that keeps one interval in memory
pub struct InMemorySink {
    id: u64,
    counters: DashMap<String, i64>,
    timers: DashMap<String, Vec<TimerSample>>,
    gauges: DashMap<String, GaugeReading>,
    annotations: DashMap<String, String>,
    open: AtomicBool,
    opened_at: DateTime<Utc>,
    closed_at: Mutex<Option<DateTime<Utc>>>,
    late_writes: AtomicU64,
    // Writers hold it shared across the open check and the insert
    write_gate: RwLock<()>,
    listener: Option<Arc<dyn FlushListener>>,
}

impl InMemorySink {
    /// Create an open sink. `listener` receives the snapshot on close.
    pub fn new(id: u64, listener: Option<Arc<dyn FlushListener>>) -> Self {
        Self {
            id,
            counters: DashMap::new(),
            timers: DashMap::new(),
            gauges: DashMap::new(),
            annotations: DashMap::new(),
            open: AtomicBool::new(true),
            opened_at: Utc::now(),
            closed_at: Mutex::new(None),
            late_writes: AtomicU64::new(0),
            write_gate: RwLock::new(()),
            listener,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).map(|entry| *entry)
    }

    pub fn gauge(&self, name: &str) -> Option<GaugeReading> {
        self.gauges.get(name).map(|entry| *entry)
    }

    pub fn timer_samples(&self, name: &str) -> Vec<TimerSample> {
        self.timers
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Writes discarded because they arrived after close
    pub fn late_writes(&self) -> u64 {
        self.late_writes.load(Ordering::Relaxed)
    }

    /// Copy of everything accumulated so far
    pub fn snapshot(&self) -> IntervalSnapshot {
        IntervalSnapshot {
            sink_id: self.id,
            opened_at: self.opened_at,
            closed_at: *self.closed_at.lock(),
            counters: self
                .counters
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            timers: self
                .timers
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            gauges: self
                .gauges
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
            annotations: self
                .annotations
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    /// Run `write` if the sink is still open, otherwise count it as late.
    /// `close` cannot flip the flag while a write is between check and insert.
    #[inline]
    fn write_if_open<F: FnOnce()>(&self, write: F) {
        let _gate = self.write_gate.read();
        if self.open.load(Ordering::Acquire) {
            write();
            return;
        }
        self.late_writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(sink_id = self.id, "Discarding write to closed sink");
    }
}

impl Sink for InMemorySink {
    fn record_counter(&self, name: &str, delta: i64) {
        self.write_if_open(|| {
            // Avoid allocating the key on the hot path
            if let Some(mut value) = self.counters.get_mut(name) {
                *value += delta;
                return;
            }
            *self.counters.entry(name.to_string()).or_insert(0) += delta;
        });
    }

    fn record_timer(&self, name: &str, duration: i64, unit: Option<TimeUnit>) {
        let sample = TimerSample {
            value: duration,
            unit,
        };
        self.write_if_open(|| {
            if let Some(mut samples) = self.timers.get_mut(name) {
                samples.push(sample);
                return;
            }
            self.timers
                .entry(name.to_string())
                .or_default()
                .push(sample);
        });
    }

    fn record_gauge(&self, name: &str, value: GaugeValue, unit: Option<Unit>) {
        self.write_if_open(|| {
            self.gauges
                .insert(name.to_string(), GaugeReading { value, unit });
        });
    }

    fn add_annotation(&self, key: &str, value: &str) {
        self.write_if_open(|| {
            self.annotations.insert(key.to_string(), value.to_string());
        });
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn open_time(&self) -> Option<DateTime<Utc>> {
        Some(self.opened_at)
    }

    fn close_time(&self) -> Option<DateTime<Utc>> {
        *self.closed_at.lock()
    }

    fn close(&self) {
        // Waits out in-flight writes so the snapshot below sees all of them
        let was_open = {
            let _gate = self.write_gate.write();
            self.open.swap(false, Ordering::AcqRel)
        };
        if !was_open {
            return;
        }
        *self.closed_at.lock() = Some(Utc::now());

        let Some(listener) = &self.listener else {
            return;
        };
        let snapshot = self.snapshot();
        if panic::catch_unwind(AssertUnwindSafe(|| listener.on_flush(snapshot))).is_err() {
            tracing::error!(sink_id = self.id, "Flush listener panicked");
        }
    }
}

impl fmt::Debug for InMemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySink")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("counters", &self.counters.len())
            .field("timers", &self.timers.len())
            .field("gauges", &self.gauges.len())
            .finish()
    }
}

/// Creates [`InMemorySink`]s with increasing ids and a shared listener
pub struct InMemorySinkFactory {
    next_id: AtomicU64,
    listener: Option<Arc<dyn FlushListener>>,
}

impl InMemorySinkFactory {
    /// Factory whose sinks log their snapshot on close
    pub fn new() -> Self {
        Self::with_listener(LoggingListener)
    }

    /// Factory whose sinks hand their snapshot to `listener`
    pub fn with_listener<L: FlushListener + 'static>(listener: L) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listener: Some(Arc::new(listener)),
        }
    }

    /// Factory whose sinks drop their data on close
    pub fn silent() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listener: None,
        }
    }

    /// Create a sink and keep its concrete type
    pub fn create_sink(&self) -> Arc<InMemorySink> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(InMemorySink::new(id, self.listener.clone()))
    }

    pub fn sinks_created(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for InMemorySinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkFactory for InMemorySinkFactory {
    fn create(&self) -> Arc<dyn Sink> {
        self.create_sink()
    }
}

impl fmt::Debug for InMemorySinkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySinkFactory")
            .field("sinks_created", &self.sinks_created())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
