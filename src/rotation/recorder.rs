//! The periodic recorder: record into the current interval, rotate on demand.

use crate::polling::{DispatchPolicy, PolledCallbackRegistry, PollingExecutor};
use crate::rotation::builder::PeriodicRecorderBuilder;
use crate::rotation::{GuardedSlot, RotationStats, RotationStatsSnapshot};
use crate::sink::{GaugeValue, NonClosingSink, Sink, SinkFactory, TimeUnit, Unit};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Records counters, timers and gauges into the sink of the current interval.
///
/// Every record operation takes the slot's shared lock, so it lands entirely
/// in one sink: the one current when the lock was taken. [`rotate`] retires
/// that sink and installs a fresh one. It is meant to be driven by a periodic
/// trigger such as [`crate::scheduler::RotationScheduler`], but any thread may
/// call it, for example to force a flush before shutdown.
///
/// The recorder does not serialize concurrent `rotate` calls. Whoever owns
/// the trigger is expected to rotate from one place at a time. Even when
/// rotations overlap, each sink is still closed exactly once.
///
/// [`rotate`]: PeriodicRecorder::rotate
pub struct PeriodicRecorder {
    factory: Arc<dyn SinkFactory>,
    current: GuardedSlot<Arc<dyn Sink>>,
    polled: PolledCallbackRegistry,
    executor: Arc<dyn PollingExecutor>,
    policy: DispatchPolicy,
    stats: Arc<RotationStats>,
}

impl PeriodicRecorder {
    /// Start building a recorder
    pub fn builder() -> PeriodicRecorderBuilder {
        PeriodicRecorderBuilder::new()
    }

    pub(crate) fn new(
        factory: Arc<dyn SinkFactory>,
        executor: Arc<dyn PollingExecutor>,
        policy: DispatchPolicy,
    ) -> Self {
        let stats = Arc::new(RotationStats::default());
        let initial = factory.create();
        stats.record_sink_created();

        Self {
            factory,
            current: GuardedSlot::new(initial),
            polled: PolledCallbackRegistry::new(),
            executor,
            policy,
            stats,
        }
    }

    /// Add `delta` to a counter in the current interval
    #[inline]
    pub fn record_counter(&self, name: &str, delta: i64) {
        self.current
            .read_locked(|sink| sink.record_counter(name, delta));
    }

    /// Record an externally measured duration in the current interval
    #[inline]
    pub fn record_timer(&self, name: &str, duration: i64, unit: Option<TimeUnit>) {
        self.current
            .read_locked(|sink| sink.record_timer(name, duration, unit));
    }

    /// Set the latest reading of a gauge in the current interval
    #[inline]
    pub fn record_gauge<V: Into<GaugeValue>>(&self, name: &str, value: V, unit: Option<Unit>) {
        let value = value.into();
        self.current
            .read_locked(|sink| sink.record_gauge(name, value, unit));
    }

    /// Run `action` against the current interval.
    ///
    /// The view cannot close the sink, and the interval cannot end while
    /// `action` runs. Keep it short: a pending rotation waits for it.
    pub fn record<R, F>(&self, action: F) -> R
    where
        F: FnOnce(&NonClosingSink) -> R,
    {
        self.current
            .read_locked(|sink| action(&NonClosingSink::new(Arc::clone(sink))))
    }

    /// Register a callback sampled once per rotation.
    ///
    /// The callback receives a view of the interval that is ending. Errors and
    /// panics are contained and logged. A callback registered while a
    /// rotation is in flight runs from the next rotation on.
    pub fn register_polled_metric<F>(&self, callback: F)
    where
        F: Fn(&NonClosingSink) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.polled.register(Arc::new(callback));
    }

    /// End the current interval.
    ///
    /// 1. Polled callbacks run against the current sink.
    /// 2. A new sink is created without holding the lock.
    /// 3. The new sink is swapped in under the exclusive lock.
    /// 4. The displaced sink is closed.
    pub fn rotate(&self) {
        let started = Instant::now();

        let retiring = self.current.read_locked(Arc::clone);
        let report = self
            .polled
            .poll(&retiring, self.executor.as_ref(), self.policy, &self.stats);
        drop(retiring);

        let fresh = self.factory.create();
        self.stats.record_sink_created();

        let retired = self.current.get_and_set(fresh);
        retired.close();

        let elapsed = started.elapsed();
        self.stats.record_rotation(elapsed);
        tracing::debug!(
            dispatched = report.dispatched,
            failed = ?report.failed,
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "Rotated metrics sink"
        );
    }

    pub fn stats(&self) -> RotationStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn polled_metric_count(&self) -> usize {
        self.polled.len()
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }
}

impl fmt::Debug for PeriodicRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicRecorder")
            .field("policy", &self.policy)
            .field("executor", &self.executor.name())
            .field("polled", &self.polled)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::InlineExecutor;
    use crate::sink::{InMemorySink, InMemorySinkFactory};
    use parking_lot::Mutex;

    /// Factory that remembers every sink it handed out
    struct TrackingFactory {
        inner: InMemorySinkFactory,
        created: Mutex<Vec<Arc<InMemorySink>>>,
    }

    impl TrackingFactory {
        fn new() -> Self {
            Self {
                inner: InMemorySinkFactory::silent(),
                created: Mutex::new(Vec::new()),
            }
        }

        fn sink(&self, index: usize) -> Arc<InMemorySink> {
            Arc::clone(&self.created.lock()[index])
        }

        fn count(&self) -> usize {
            self.created.lock().len()
        }
    }

    impl SinkFactory for TrackingFactory {
        fn create(&self) -> Arc<dyn Sink> {
            let sink = self.inner.create_sink();
            self.created.lock().push(Arc::clone(&sink));
            sink
        }
    }

    fn recorder() -> (Arc<TrackingFactory>, PeriodicRecorder) {
        let factory = Arc::new(TrackingFactory::new());
        let recorder = PeriodicRecorder::new(
            Arc::clone(&factory) as Arc<dyn SinkFactory>,
            Arc::new(InlineExecutor),
            DispatchPolicy::AwaitCompletion,
        );
        (factory, recorder)
    }

    #[test]
    fn test_creates_initial_sink() {
        let (factory, recorder) = recorder();
        assert_eq!(factory.count(), 1);
        assert_eq!(recorder.stats().sinks_created, 1);
    }

    #[test]
    fn test_record_counter() {
        let (factory, recorder) = recorder();
        recorder.record_counter("foo", 1);
        assert_eq!(factory.sink(0).counter("foo"), Some(1));
    }

    #[test]
    fn test_record_timer_with_unit() {
        let (factory, recorder) = recorder();
        recorder.record_timer("foo", 1, Some(TimeUnit::Milliseconds));
        let samples = factory.sink(0).timer_samples("foo");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].unit, Some(TimeUnit::Milliseconds));
    }

    #[test]
    fn test_record_gauges() {
        let (factory, recorder) = recorder();
        recorder.record_gauge("long", 10i64, None);
        recorder.record_gauge("double", 2.5f64, Some(Unit::Byte));

        let sink = factory.sink(0);
        assert_eq!(sink.gauge("long").unwrap().value, GaugeValue::Integer(10));
        let double = sink.gauge("double").unwrap();
        assert_eq!(double.value, GaugeValue::Float(2.5));
        assert_eq!(double.unit, Some(Unit::Byte));
    }

    #[test]
    fn test_record_gives_non_closing_view() {
        let (factory, recorder) = recorder();
        let was_open = recorder.record(|sink| {
            sink.record_counter("one_off", 3);
            sink.close();
            sink.is_open()
        });

        assert!(was_open);
        assert!(factory.sink(0).is_open());
        assert_eq!(factory.sink(0).counter("one_off"), Some(3));
    }

    #[test]
    fn test_rotate_swaps_and_closes() {
        let (factory, recorder) = recorder();
        recorder.record_counter("foo", 1);
        recorder.rotate();
        recorder.record_counter("foo", 1);

        assert_eq!(factory.count(), 2);
        assert!(!factory.sink(0).is_open());
        assert!(factory.sink(1).is_open());
        assert_eq!(factory.sink(0).counter("foo"), Some(1));
        assert_eq!(factory.sink(1).counter("foo"), Some(1));
        assert_eq!(recorder.stats().rotations, 1);
    }

    #[test]
    fn test_polled_metrics_hit_retiring_sink() {
        let (factory, recorder) = recorder();
        recorder.register_polled_metric(|sink| {
            sink.record_gauge("polled", GaugeValue::Integer(1), None);
            Ok(())
        });
        assert_eq!(recorder.polled_metric_count(), 1);

        recorder.rotate();

        assert!(factory.sink(0).gauge("polled").is_some());
        assert!(factory.sink(1).gauge("polled").is_none());
        assert_eq!(recorder.stats().callbacks_dispatched, 1);
    }

    #[test]
    fn test_failing_callback_does_not_abort_rotation() {
        let (factory, recorder) = recorder();
        recorder.register_polled_metric(|_| anyhow::bail!("broken probe"));
        recorder.rotate();

        assert!(!factory.sink(0).is_open());
        assert!(factory.sink(1).is_open());
        assert_eq!(recorder.stats().callback_failures, 1);
    }

    #[test]
    fn test_debug_output() {
        let (_factory, recorder) = recorder();
        let debug = format!("{:?}", recorder);
        assert!(debug.contains("AwaitCompletion"));
        assert!(debug.contains("inline"));
        assert_eq!(recorder.executor_name(), "inline");
        assert_eq!(recorder.dispatch_policy(), DispatchPolicy::AwaitCompletion);
    }
}
