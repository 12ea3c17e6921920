//! Host-side evaluation of the forward kernel contract.
//!
//! [`HostReference`] holds the same three flat arrays a
//! [`BufferStore`](crate::gpu::BufferStore) keeps on the device and runs each
//! layer exactly as the WGSL kernel does: row-major weighted sum, bias add,
//! activation, write into the layer's output slice. GPU results are checked
//! against it.

use crate::errors::{BufferKind, ForwardError, ForwardResult};
use crate::layout::NetworkLayout;

/// Host copy of a network's weights, biases and activations.
#[derive(Debug, Clone)]
pub struct HostReference {
    layout: NetworkLayout,
    weights: Vec<f32>,
    biases: Vec<f32>,
    activations: Vec<f32>,
}

impl HostReference {
    /// Create a reference network over `layout` with the given parameters.
    ///
    /// Activations start zeroed.
    pub fn new(layout: NetworkLayout, weights: &[f32], biases: &[f32]) -> ForwardResult<Self> {
        if weights.len() != layout.total_weights() {
            return Err(ForwardError::size_mismatch(
                BufferKind::Weights,
                layout.total_weights(),
                weights.len(),
            ));
        }
        if biases.len() != layout.total_biases() {
            return Err(ForwardError::size_mismatch(
                BufferKind::Biases,
                layout.total_biases(),
                biases.len(),
            ));
        }
        let activations = vec![0.0; layout.total_neurons()];
        Ok(Self {
            layout,
            weights: weights.to_vec(),
            biases: biases.to_vec(),
            activations,
        })
    }

    pub fn layout(&self) -> &NetworkLayout {
        &self.layout
    }

    /// Overwrite the input slice, leaving every other activation untouched.
    pub fn set_inputs(&mut self, inputs: &[f32]) -> ForwardResult<()> {
        let input_size = self.layout.input_size();
        if inputs.len() != input_size {
            return Err(ForwardError::size_mismatch(
                BufferKind::Inputs,
                input_size,
                inputs.len(),
            ));
        }
        self.activations[..input_size].copy_from_slice(inputs);
        Ok(())
    }

    pub fn clear_activations(&mut self) {
        self.activations.fill(0.0);
    }

    /// Run every layer in ascending order.
    pub fn forward(&mut self) -> ForwardResult<()> {
        for index in 0..self.layout.layer_count() {
            self.forward_layer(index)?;
        }
        Ok(())
    }

    /// Run a single layer.
    pub fn forward_layer(&mut self, index: usize) -> ForwardResult<()> {
        let layer = *self
            .layout
            .layers()
            .get(index)
            .ok_or(ForwardError::IndexOutOfRange {
                index,
                layer_count: self.layout.layer_count(),
            })?;
        let activation = layer.activation()?;

        let input_start = layer.activation_input_offset as usize;
        let output_start = layer.activation_output_offset as usize;
        let input_size = layer.input_size as usize;

        for output in 0..layer.output_size {
            let row_start = layer.weight_index(output, 0);
            let row = &self.weights[row_start..row_start + input_size];
            let inputs = &self.activations[input_start..input_start + input_size];

            let mut sum = self.biases[(layer.bias_offset + output) as usize];
            for (w, x) in row.iter().zip(inputs) {
                sum += w * x;
            }
            self.activations[output_start + output as usize] = activation.apply(sum);
        }
        Ok(())
    }

    pub fn activations(&self) -> &[f32] {
        &self.activations
    }

    /// Trailing output-layer slice of the activations.
    pub fn outputs(&self) -> &[f32] {
        &self.activations[self.layout.output_offset()..]
    }
}
