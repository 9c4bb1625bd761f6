use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for the acquisition pipeline
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to launch process: {0}")]
    Launch(String),

    #[error("Failed to write to session: {0}")]
    Write(String),

    #[error("No reply from session within {0:?}")]
    Timeout(Duration),

    #[error("Session output ended unexpectedly")]
    EndOfStream,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed capture record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Target not reachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the acquisition pipeline
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create a launch error
    pub fn launch<S: Into<String>>(msg: S) -> Self {
        MonitorError::Launch(msg.into())
    }

    /// Create a write error
    pub fn write<S: Into<String>>(msg: S) -> Self {
        MonitorError::Write(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        MonitorError::Config(msg.into())
    }

    pub fn malformed<S: Into<String>>(line: usize, reason: S) -> Self {
        MonitorError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn invalid_sample<S: Into<String>>(msg: S) -> Self {
        MonitorError::InvalidSample(msg.into())
    }

    pub fn unreachable<S: Into<String>>(msg: S) -> Self {
        MonitorError::Unreachable(msg.into())
    }

    /// True for failures of the session channel itself (write, timeout, EOF)
    pub fn is_channel_failure(&self) -> bool {
        matches!(
            self,
            MonitorError::Write(_) | MonitorError::Timeout(_) | MonitorError::EndOfStream
        )
    }
}
