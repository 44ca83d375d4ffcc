//! Error types for disha-resource

use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a resource from being opened at all.
///
/// Problems inside the destination/tour graph never surface here; they are
/// recorded as strings on the affected nodes.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}: resource has no name")]
    MissingName(PathBuf),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ResourceError>;
