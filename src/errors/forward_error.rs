//! Error types for layout planning, buffer access and stage dispatch.

use std::fmt;

use thiserror::Error;

/// Identifies one of the flat device buffers owned by a buffer store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Weights,
    Biases,
    Activations,
    /// The input slice at the head of the activation buffer.
    Inputs,
    /// The output slice at the tail of the activation buffer.
    Outputs,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::Weights => "weights",
            BufferKind::Biases => "biases",
            BufferKind::Activations => "activations",
            BufferKind::Inputs => "inputs",
            BufferKind::Outputs => "outputs",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while planning, filling or executing a network.
///
/// Validation failures are always reported before any device work is issued,
/// so an `Err` from a store or dispatcher call leaves device state unchanged.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Invalid network configuration: {reason}")]
    Configuration { reason: String },

    #[error("Size mismatch for {buffer}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        buffer: BufferKind,
        expected: usize,
        actual: usize,
    },

    #[error("Layer index {index} out of range for {layer_count} layers")]
    IndexOutOfRange { index: usize, layer_count: usize },

    #[error("Kernel compilation failed: {message}")]
    Compilation { message: String },

    #[error("Device failure during {operation}: {message}")]
    Device { operation: String, message: String },

    #[error("Buffer store has no topology bound")]
    StoreUnbound,

    #[error("Stage dispatcher is not ready")]
    DispatcherNotReady,
}

impl ForwardError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        ForwardError::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn size_mismatch(buffer: BufferKind, expected: usize, actual: usize) -> Self {
        ForwardError::SizeMismatch {
            buffer,
            expected,
            actual,
        }
    }

    pub(crate) fn device(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ForwardError::Device {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
