//! Periodic metrics - interval-based metric recording with lossless rotation.
//!
//! Many threads record counters, timers and gauges into the sink of the
//! current interval while a periodic trigger rotates that sink out for
//! flushing and installs a fresh one. No sample is dropped or counted twice
//! across the rotation boundary.
//!
//! # Features
//!
//! - **Lossless Rotation**: Writers hold a shared lock for the duration of one
//!   record call, the swap takes the exclusive lock
//! - **Polled Metrics**: Callbacks sampled once per rotation against the
//!   interval that is ending
//! - **Pluggable Sinks**: Any [`sink::Sink`] backend through a [`sink::SinkFactory`]
//! - **Pluggable Execution**: Polled callbacks run inline, on rayon or on tokio
//!
//! # Architecture
//!
//! - `rotation`: Guarded slot, recorder and builder
//! - `polling`: Callback registry and executors
//! - `sink`: Sink contract, non-closing view and the in-memory reference sink
//! - `scheduler`: Tokio-driven periodic trigger
//! - `core`: Configuration and errors
//! - `cli`: Demo command-line interface
//!
//! # Example
//!
//! ```no_run
//! use periodic_metrics::{PeriodicRecorder, RotationScheduler};
//! use periodic_metrics::sink::{GaugeValue, InMemorySinkFactory, Sink};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> periodic_metrics::Result<()> {
//!     let recorder = Arc::new(
//!         PeriodicRecorder::builder()
//!             .sink_factory(InMemorySinkFactory::new())
//!             .build(),
//!     );
//!     recorder.register_polled_metric(|sink| {
//!         sink.record_gauge("queue.depth", GaugeValue::Integer(3), None);
//!         Ok(())
//!     });
//!
//!     let scheduler = RotationScheduler::new(Duration::from_millis(500))?
//!         .spawn(Arc::clone(&recorder));
//!
//!     recorder.record_counter("requests", 1);
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod polling;
pub mod rotation;
pub mod scheduler;
pub mod sink;

// Re-export core types for convenience
pub use crate::core::{Config, PeriodicError, Result};
pub use crate::polling::DispatchPolicy;
pub use crate::rotation::{PeriodicRecorder, PeriodicRecorderBuilder};
pub use crate::scheduler::{RotationScheduler, SchedulerHandle};
pub use crate::sink::{NonClosingSink, Sink, SinkFactory};
