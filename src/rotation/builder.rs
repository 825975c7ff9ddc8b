//! Builder for [`PeriodicRecorder`] with logged defaulting.
//!
//! Building never fails. Whatever was not supplied is replaced by a default,
//! a warning is logged, and the substitution is listed in a [`BuildReport`].

use crate::core::{Config, ExecutorKind, Result};
use crate::polling::{DispatchPolicy, InlineExecutor, PollingExecutor, RayonExecutor, TokioExecutor};
use crate::rotation::PeriodicRecorder;
use crate::sink::{InMemorySinkFactory, SinkFactory};
use std::fmt;
use std::sync::Arc;

/// A builder field that was replaced by its default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultedField {
    /// Replaced by an [`InMemorySinkFactory`] that logs each interval
    SinkFactory,
    /// Replaced by [`InlineExecutor`]
    PollingExecutor,
}

/// What the builder had to fill in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub defaulted: Vec<DefaultedField>,
}

impl BuildReport {
    /// True when every field was supplied explicitly
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }

    pub fn was_defaulted(&self, field: DefaultedField) -> bool {
        self.defaulted.contains(&field)
    }
}

/// Builder for [`PeriodicRecorder`]
#[derive(Default)]
pub struct PeriodicRecorderBuilder {
    sink_factory: Option<Arc<dyn SinkFactory>>,
    polling_executor: Option<Arc<dyn PollingExecutor>>,
    dispatch_policy: DispatchPolicy,
}

impl PeriodicRecorderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with executor and dispatch policy taken from `config`.
    ///
    /// Fails only when the configured executor cannot be created: a rayon
    /// pool that does not build, or the tokio executor outside a runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let executor: Arc<dyn PollingExecutor> = match config.polling.executor {
            ExecutorKind::Inline => Arc::new(InlineExecutor),
            ExecutorKind::Rayon => Arc::new(RayonExecutor::new(config.polling.threads)?),
            ExecutorKind::Tokio => Arc::new(TokioExecutor::current()?),
        };

        Ok(Self::new()
            .shared_polling_executor(executor)
            .dispatch_policy(config.polling.policy))
    }

    /// Set the factory that creates each interval's sink
    pub fn sink_factory<F: SinkFactory + 'static>(self, factory: F) -> Self {
        self.shared_sink_factory(Arc::new(factory))
    }

    /// Set a factory that is shared with other owners
    pub fn shared_sink_factory(mut self, factory: Arc<dyn SinkFactory>) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    /// Set where polled callbacks run
    pub fn polling_executor<E: PollingExecutor + 'static>(self, executor: E) -> Self {
        self.shared_polling_executor(Arc::new(executor))
    }

    /// Set an executor that is shared with other owners
    pub fn shared_polling_executor(mut self, executor: Arc<dyn PollingExecutor>) -> Self {
        self.polling_executor = Some(executor);
        self
    }

    /// Set whether rotation waits for polled callbacks
    pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    /// Build the recorder
    pub fn build(self) -> PeriodicRecorder {
        self.build_with_report().0
    }

    /// Build the recorder and report which fields were defaulted
    pub fn build_with_report(self) -> (PeriodicRecorder, BuildReport) {
        let mut report = BuildReport::default();

        let sink_factory = self.sink_factory.unwrap_or_else(|| {
            let factory = InMemorySinkFactory::new();
            tracing::warn!("Defaulted missing sink factory; sink_factory={:?}", factory);
            report.defaulted.push(DefaultedField::SinkFactory);
            Arc::new(factory)
        });

        let polling_executor = self.polling_executor.unwrap_or_else(|| {
            tracing::warn!("Defaulted missing polling executor; polling_executor={:?}", InlineExecutor);
            report.defaulted.push(DefaultedField::PollingExecutor);
            Arc::new(InlineExecutor)
        });

        let recorder = PeriodicRecorder::new(sink_factory, polling_executor, self.dispatch_policy);
        (recorder, report)
    }
}

impl fmt::Debug for PeriodicRecorderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicRecorderBuilder")
            .field("sink_factory", &self.sink_factory.is_some())
            .field(
                "polling_executor",
                &self.polling_executor.as_ref().map(|executor| executor.name()),
            )
            .field("dispatch_policy", &self.dispatch_policy)
            .finish()
    }
}
