//! Interval rotation: the guarded slot, the recorder and its builder.

pub mod builder;
pub mod recorder;
pub mod slot;
pub mod stats;

pub use builder::{BuildReport, DefaultedField, PeriodicRecorderBuilder};
pub use recorder::PeriodicRecorder;
pub use slot::GuardedSlot;
pub use stats::{RotationStats, RotationStatsSnapshot};
