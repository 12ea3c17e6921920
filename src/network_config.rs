//! JSON network descriptions.
//!
//! A [`NetworkConfig`] carries everything needed to fill a buffer store:
//!
//! ```json
//! {
//!   "topology": [2, 2, 1],
//!   "activations": ["RELU", "RELU"],
//!   "weights": [1.0, 1.0, 1.0, 1.0, 1.0, -2.0],
//!   "biases": [0.0, -1.5, 0.0],
//!   "inputs": [[0.0, 1.0]]
//! }
//! ```
//!
//! Weights are concatenated per layer, row-major by output neuron.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;
use crate::errors::{ForwardResult, NetworkConfigError, NetworkConfigResult};
use crate::layout::NetworkLayout;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Neuron count per layer, input layer first.
    pub topology: Vec<u32>,
    /// One activation per connected layer pair.
    pub activations: Vec<ActivationKind>,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
    /// Optional sample inputs for drivers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Vec<f32>>,
}

impl NetworkConfig {
    pub fn from_json_str(content: &str) -> NetworkConfigResult<Self> {
        serde_json::from_str(content).map_err(|source| NetworkConfigError::Parse { source })
    }

    pub fn from_path(path: impl AsRef<Path>) -> NetworkConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| NetworkConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Plan the layout this configuration describes.
    pub fn layout(&self) -> ForwardResult<NetworkLayout> {
        NetworkLayout::plan(&self.topology, &self.activations)
    }

    /// Hand-built 2-2-1 ReLU network used by the demo driver.
    pub fn xor() -> Self {
        Self {
            topology: vec![2, 2, 1],
            activations: vec![ActivationKind::Relu, ActivationKind::Relu],
            weights: vec![
                1.0, 1.0, // hidden 0
                1.0, 1.0, // hidden 1
                1.0, -2.0, // output
            ],
            biases: vec![0.0, -1.5, 0.0],
            inputs: vec![
                vec![0.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
            ],
        }
    }
}
