//! Metric sinks: the accumulation targets a recorder rotates.
//!
//! A sink collects counters, timers and gauges for exactly one interval.
//! The recorder only ever talks to sinks through the [`Sink`] trait and
//! obtains fresh ones from a [`SinkFactory`], so any backend can be wired in.

pub mod memory;
pub mod non_closing;
pub mod units;

pub use memory::{
    FlushListener, GaugeReading, InMemorySink, InMemorySinkFactory, IntervalSnapshot,
    LoggingListener, TimerSample,
};
pub use non_closing::NonClosingSink;
pub use units::{GaugeValue, TimeUnit, Unit};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Accumulation target for one interval.
///
/// Implementations must accept concurrent writers. `close` must be idempotent,
/// must not panic and must return in bounded time. Writes that arrive after
/// `close` should be ignored rather than treated as errors.
pub trait Sink: Send + Sync {
    /// Add `delta` to the named counter. Negative deltas decrement.
    fn record_counter(&self, name: &str, delta: i64);

    /// Record an externally measured duration as a timer sample.
    fn record_timer(&self, name: &str, duration: i64, unit: Option<TimeUnit>);

    /// Set the latest reading of the named gauge.
    fn record_gauge(&self, name: &str, value: GaugeValue, unit: Option<Unit>);

    /// Attach a key/value annotation to the interval.
    fn add_annotation(&self, key: &str, value: &str);

    /// Attach several annotations at once.
    fn add_annotations(&self, annotations: &HashMap<String, String>) {
        for (key, value) in annotations {
            self.add_annotation(key, value);
        }
    }

    /// Whether the sink still accepts writes.
    fn is_open(&self) -> bool;

    /// When the sink was opened, if tracked.
    fn open_time(&self) -> Option<DateTime<Utc>>;

    /// When the sink was closed, if it has been.
    fn close_time(&self) -> Option<DateTime<Utc>>;

    /// Finalize the interval.
    fn close(&self);
}

/// Creates the sink for each new interval.
pub trait SinkFactory: Send + Sync {
    /// Create a new, open sink.
    fn create(&self) -> Arc<dyn Sink>;
}

impl<F> SinkFactory for F
where
    F: Fn() -> Arc<dyn Sink> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Sink> {
        self()
    }
}
