use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeriodicError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polling executor error: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Rotation scheduler already stopped")]
    SchedulerStopped,
}

/// Result type alias for periodic metrics operations
pub type Result<T> = std::result::Result<T, PeriodicError>;

impl PeriodicError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new executor error
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Self::Executor(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Executor(_) => "executor",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
            Self::Join(_) => "async",
            Self::SchedulerStopped => "scheduler",
        }
    }
}
