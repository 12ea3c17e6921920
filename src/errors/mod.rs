//! Error types for the layered forward-pass library.
//!
//! This module contains specific error types used throughout the library,
//! avoiding generic error wrappers like `anyhow` or `Box<dyn Error>` for better
//! error handling and debugging.

mod forward_error;
mod network_config_error;

pub use forward_error::{BufferKind, ForwardError};
pub use network_config_error::NetworkConfigError;

/// Result type alias for buffer store and dispatcher operations.
pub type ForwardResult<T> = std::result::Result<T, ForwardError>;

/// Result type alias for network configuration loading.
pub type NetworkConfigResult<T> = std::result::Result<T, NetworkConfigError>;
