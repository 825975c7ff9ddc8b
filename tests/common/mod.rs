//! Common test utilities and fixtures.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use periodic_metrics::sink::{GaugeValue, Sink, SinkFactory, TimeUnit, Unit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

type CloseHook = Box<dyn Fn(u64) + Send + Sync>;

/// Sink that keeps everything it was given and counts how it was closed.
pub struct StubSink {
    id: u64,
    opened_at: DateTime<Utc>,
    closed_at: Mutex<Option<DateTime<Utc>>>,
    open: AtomicBool,
    close_calls: AtomicUsize,
    writes_after_close: AtomicU64,
    counters: Mutex<HashMap<String, i64>>,
    timers: Mutex<HashMap<String, Vec<i64>>>,
    gauges: Mutex<HashMap<String, GaugeValue>>,
    annotations: Mutex<HashMap<String, String>>,
    close_hook: Arc<OnceLock<CloseHook>>,
}

impl StubSink {
    fn new(id: u64, close_hook: Arc<OnceLock<CloseHook>>) -> Self {
        Self {
            id,
            opened_at: Utc::now(),
            closed_at: Mutex::new(None),
            open: AtomicBool::new(true),
            close_calls: AtomicUsize::new(0),
            writes_after_close: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            annotations: Mutex::new(HashMap::new()),
            close_hook,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn writes_after_close(&self) -> u64 {
        self.writes_after_close.load(Ordering::SeqCst)
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn timer_samples(&self, name: &str) -> Vec<i64> {
        self.timers.lock().get(name).cloned().unwrap_or_default()
    }

    pub fn gauge(&self, name: &str) -> Option<GaugeValue> {
        self.gauges.lock().get(name).copied()
    }

    pub fn annotation(&self, key: &str) -> Option<String> {
        self.annotations.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
            && self.timers.lock().is_empty()
            && self.gauges.lock().is_empty()
    }

    fn accepting(&self) -> bool {
        if self.open.load(Ordering::SeqCst) {
            true
        } else {
            self.writes_after_close.fetch_add(1, Ordering::SeqCst);
            false
        }
    }
}

impl Sink for StubSink {
    fn record_counter(&self, name: &str, delta: i64) {
        if self.accepting() {
            *self.counters.lock().entry(name.to_string()).or_insert(0) += delta;
        }
    }

    fn record_timer(&self, name: &str, duration: i64, _unit: Option<TimeUnit>) {
        if self.accepting() {
            self.timers
                .lock()
                .entry(name.to_string())
                .or_default()
                .push(duration);
        }
    }

    fn record_gauge(&self, name: &str, value: GaugeValue, _unit: Option<Unit>) {
        if self.accepting() {
            self.gauges.lock().insert(name.to_string(), value);
        }
    }

    fn add_annotation(&self, key: &str, value: &str) {
        if self.accepting() {
            self.annotations
                .lock()
                .insert(key.to_string(), value.to_string());
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn open_time(&self) -> Option<DateTime<Utc>> {
        Some(self.opened_at)
    }

    fn close_time(&self) -> Option<DateTime<Utc>> {
        *self.closed_at.lock()
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.open.swap(false, Ordering::SeqCst) {
            *self.closed_at.lock() = Some(Utc::now());
            if let Some(hook) = self.close_hook.get() {
                hook(self.id);
            }
        }
    }
}

/// Factory handing out [`StubSink`]s and remembering every one of them.
pub struct StubFactory {
    created: Mutex<Vec<Arc<StubSink>>>,
    next_id: AtomicU64,
    close_hook: Arc<OnceLock<CloseHook>>,
}

impl StubFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            close_hook: Arc::new(OnceLock::new()),
        })
    }

    /// Run `hook` with the sink id whenever a sink is closed for the first time.
    pub fn on_close<F>(&self, hook: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        assert!(
            self.close_hook.set(Box::new(hook)).is_ok(),
            "close hook already installed"
        );
    }

    pub fn sink(&self, index: usize) -> Arc<StubSink> {
        Arc::clone(&self.created.lock()[index])
    }

    pub fn sinks(&self) -> Vec<Arc<StubSink>> {
        self.created.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    /// Sum of one counter across every sink handed out so far
    pub fn counter_total(&self, name: &str) -> i64 {
        self.created.lock().iter().map(|sink| sink.counter(name)).sum()
    }
}

impl SinkFactory for StubFactory {
    fn create(&self) -> Arc<dyn Sink> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sink = Arc::new(StubSink::new(id, Arc::clone(&self.close_hook)));
        self.created.lock().push(Arc::clone(&sink));
        sink
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
