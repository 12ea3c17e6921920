//! Activation functions selectable per layer.
//!
//! Each layer descriptor carries a `u32` activation code that the forward
//! kernel switches on. [`ActivationKind`] is the host-side view of those codes,
//! and also evaluates the functions on the host for the reference path.

use serde::{Deserialize, Serialize};

use crate::errors::{ForwardError, ForwardResult};

/// Nonlinearity applied when a layer writes its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivationKind {
    /// Rectified Linear Unit activation function: f(x) = max(0, x).
    Relu,
    /// Sigmoid activation function: f(x) = 1 / (1 + exp(-x)).
    Sigmoid,
    /// Hyperbolic tangent activation function: f(x) = tanh(x).
    Tanh,
    /// Pass-through: f(x) = x.
    Identity,
}

/// Activation codes matching the WGSL kernel's `switch`.
pub mod codes {
    pub const RELU: u32 = 0;
    pub const SIGMOID: u32 = 1;
    pub const TANH: u32 = 2;
    pub const IDENTITY: u32 = 3;
}

impl ActivationKind {
    /// Device code stored in [`LayerDescriptor::activation_kind`](crate::layout::LayerDescriptor).
    pub fn code(self) -> u32 {
        match self {
            ActivationKind::Relu => codes::RELU,
            ActivationKind::Sigmoid => codes::SIGMOID,
            ActivationKind::Tanh => codes::TANH,
            ActivationKind::Identity => codes::IDENTITY,
        }
    }

    /// Decode a raw device code.
    pub fn from_code(code: u32) -> ForwardResult<Self> {
        match code {
            codes::RELU => Ok(ActivationKind::Relu),
            codes::SIGMOID => Ok(ActivationKind::Sigmoid),
            codes::TANH => Ok(ActivationKind::Tanh),
            codes::IDENTITY => Ok(ActivationKind::Identity),
            other => Err(ForwardError::configuration(format!(
                "unknown activation code {other}"
            ))),
        }
    }

    /// Apply the activation function to a single value.
    pub fn apply(self, x: f32) -> f32 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::Identity => x,
        }
    }
}
