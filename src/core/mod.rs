//! Core configuration and error types.
//!
//! Everything the rotation machinery shares but that is not itself part of
//! the recording path lives here.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, ExecutorKind, LogLevel, DEFAULT_ROTATION_INTERVAL};
pub use error::{PeriodicError, Result};
