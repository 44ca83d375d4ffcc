//! Error types for SetuLink

use thiserror::Error;

/// SetuLink error type
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource error: {0}")]
    Resource(#[from] disha_resource::ResourceError),

    /// No connected transport to carry the request
    #[error("Not connected")]
    NotConnected,

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<toml::de::Error> for LinkError {
    fn from(e: toml::de::Error) -> Self {
        LinkError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
