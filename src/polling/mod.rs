//! Polled metrics: callbacks sampled once per rotation.
//!
//! Callbacks are registered on a [`PolledCallbackRegistry`] and dispatched to
//! a [`PollingExecutor`] against the sink that is current when the rotation
//! starts. The [`DispatchPolicy`] decides whether the rotation waits for them.

pub mod executor;
pub mod registry;

pub use executor::{InlineExecutor, PollTask, PollingExecutor, RayonExecutor, TokioExecutor};
pub use registry::{PollReport, PolledCallback, PolledCallbackRegistry};

use serde::{Deserialize, Serialize};

/// Whether a rotation waits for its polled callbacks before swapping sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Rotation blocks until every polled callback has finished, so no polled
    /// write can land in a sink after it was closed.
    #[default]
    AwaitCompletion,
    /// Rotation continues immediately. A slow callback may write into a sink
    /// that is already closed; sinks must treat such writes as a no-op.
    FireAndForget,
}
