//! Server error types.

use std::path::PathBuf;

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] vdbhub_core::Error),

    /// A descriptor file could not be parsed.
    #[error("invalid descriptor {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
