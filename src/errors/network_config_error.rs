//! Error types for loading network configurations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a network description from JSON.
#[derive(Error, Debug)]
pub enum NetworkConfigError {
    #[error("Failed to read network config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse network config: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
}
