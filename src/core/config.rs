//! Configuration management for periodic metrics.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides (applied through [`ConfigBuilder`])
//! - Validation and defaults

use crate::core::{PeriodicError, Result};
use crate::polling::DispatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default period between two rotations.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(500);

/// Complete configuration for a periodic recorder and its scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rotation schedule configuration
    pub rotation: RotationConfig,
    /// Polled callback execution configuration
    pub polling: PollingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Rotation schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Period between rotations
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Rotate one last time when the scheduler shuts down
    pub final_flush: bool,
}

/// Polled callback execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Where polled callbacks run
    pub executor: ExecutorKind,
    /// Worker threads for the rayon executor
    pub threads: usize,
    /// Whether rotation waits for polled callbacks
    pub policy: DispatchPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers in log lines
    pub structured: bool,
}

/// Polling executor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Run callbacks on the rotating thread
    Inline,
    /// Run callbacks on a dedicated rayon pool
    Rayon,
    /// Run callbacks on the tokio blocking pool
    Tokio,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rotation: RotationConfig::default(),
            polling: PollingConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            interval: DEFAULT_ROTATION_INTERVAL,
            final_flush: true,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            executor: ExecutorKind::Inline,
            threads: 4,
            policy: DispatchPolicy::AwaitCompletion,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        ConfigBuilder::new().from_yaml(&content)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rotation.interval.is_zero() {
            return Err(PeriodicError::config("rotation interval must be greater than 0"));
        }

        if self.polling.executor == ExecutorKind::Rayon && self.polling.threads == 0 {
            return Err(PeriodicError::config(
                "polling threads must be greater than 0 for the rayon executor",
            ));
        }

        Ok(())
    }

    /// Effective log level, taking debug mode into account
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.logging.level
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| PeriodicError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set rotation interval
    pub fn rotation_interval(mut self, interval: Duration) -> Self {
        self.config.rotation.interval = interval;
        self
    }

    /// Enable or disable the final flush on shutdown
    pub fn final_flush(mut self, enable: bool) -> Self {
        self.config.rotation.final_flush = enable;
        self
    }

    /// Set polling executor kind
    pub fn executor(mut self, kind: ExecutorKind) -> Self {
        self.config.polling.executor = kind;
        self
    }

    /// Set rayon worker threads
    pub fn polling_threads(mut self, threads: usize) -> Self {
        self.config.polling.threads = threads;
        self
    }

    /// Set dispatch policy
    pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.config.polling.policy = policy;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
