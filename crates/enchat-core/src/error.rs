//! Error types for the EnChat gateway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },

    // Storage errors
    #[error("Storage quota exceeded: {0}")]
    StorageQuota(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    #[error("Failed to populate partition {partition}: {url} ({reason})")]
    PopulateFailed {
        partition: String,
        url: String,
        reason: String,
    },

    // Lifecycle errors
    #[error("Install of version {version} failed: {reason}")]
    InstallFailed { version: String, reason: String },

    #[error("No active gateway instance")]
    NoActiveInstance,

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Auxiliary channels
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Pending action not found: {0}")]
    ActionNotFound(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error came from the network side of a fetch.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidRequest(format!("invalid URL: {}", err))
    }
}
