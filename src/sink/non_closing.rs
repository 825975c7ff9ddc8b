//! A sink view that cannot be closed.
//!
//! Handed to polled callbacks and one-off recorders so user code can write
//! into the current interval without being able to end it. Only the rotation
//! closes a sink, and only the one it just displaced.

use crate::sink::{GaugeValue, Sink, TimeUnit, Unit};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Forwards every [`Sink`] operation except `close`, which does nothing.
#[derive(Clone)]
pub struct NonClosingSink {
    inner: Arc<dyn Sink>,
}

impl NonClosingSink {
    pub fn new(inner: Arc<dyn Sink>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for NonClosingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonClosingSink")
            .field("open", &self.inner.is_open())
            .finish()
    }
}

impl Sink for NonClosingSink {
    #[inline]
    fn record_counter(&self, name: &str, delta: i64) {
        self.inner.record_counter(name, delta);
    }

    #[inline]
    fn record_timer(&self, name: &str, duration: i64, unit: Option<TimeUnit>) {
        self.inner.record_timer(name, duration, unit);
    }

    #[inline]
    fn record_gauge(&self, name: &str, value: GaugeValue, unit: Option<Unit>) {
        self.inner.record_gauge(name, value, unit);
    }

    fn add_annotation(&self, key: &str, value: &str) {
        self.inner.add_annotation(key, value);
    }

    fn add_annotations(&self, annotations: &HashMap<String, String>) {
        self.inner.add_annotations(annotations);
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn open_time(&self) -> Option<DateTime<Utc>> {
        self.inner.open_time()
    }

    fn close_time(&self) -> Option<DateTime<Utc>> {
        self.inner.close_time()
    }

    fn close(&self) {
        // Intentionally not forwarded
    }
}
