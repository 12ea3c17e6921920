//! Offset planning for flat weight, bias and activation buffers.
//!
//! A topology such as `[2, 2, 1]` is flattened into three arrays:
//! - Weights: per-layer `output_size x input_size` blocks, row-major by output neuron
//! - Biases: per-layer `output_size` blocks
//! - Activations: every layer's neurons back to back, input layer first
//!
//! [`NetworkLayout`] computes where each layer lives in those arrays and
//! produces the [`LayerDescriptor`] table uploaded to the device.

use log::{debug, info};

use crate::activation::ActivationKind;
use crate::errors::{ForwardError, ForwardResult};

/// Per-layer record consumed by the forward kernel (32 bytes / 8 u32s).
///
/// The field order and padding mirror the WGSL `LayerDescriptor` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LayerDescriptor {
    pub input_size: u32,
    pub output_size: u32,
    /// Element offset of this layer's first weight.
    pub weight_offset: u32,
    /// Element offset of this layer's first bias.
    pub bias_offset: u32,
    pub activation_kind: u32,
    /// Element offset of the input slice in the activation buffer.
    pub activation_input_offset: u32,
    /// Element offset of the output slice in the activation buffer.
    pub activation_output_offset: u32,
    pub padding: u32,
}

// Storage-buffer array stride expected by the kernel.
const _: () = assert!(std::mem::size_of::<LayerDescriptor>() == LayerDescriptor::SIZE_BYTES);

impl LayerDescriptor {
    pub const SIZE_BYTES: usize = 32;
    pub const SIZE_U32S: usize = 8;

    /// Activation selected for this layer.
    pub fn activation(&self) -> ForwardResult<ActivationKind> {
        ActivationKind::from_code(self.activation_kind)
    }

    /// Flat index of the weight connecting input `input` to output `output`.
    pub fn weight_index(&self, output: u32, input: u32) -> usize {
        (self.weight_offset + output * self.input_size + input) as usize
    }

    /// Number of weights owned by this layer.
    pub fn weight_count(&self) -> usize {
        self.input_size as usize * self.output_size as usize
    }
}

/// Offset table and buffer totals for one topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLayout {
    topology: Vec<u32>,
    layers: Vec<LayerDescriptor>,
    total_weights: u32,
    total_biases: u32,
    total_neurons: u32,
}

impl NetworkLayout {
    /// Plan the layout of `topology` with one activation per connected layer pair.
    pub fn plan(topology: &[u32], activations: &[ActivationKind]) -> ForwardResult<Self> {
        if topology.len() < 2 {
            return Err(ForwardError::configuration(format!(
                "topology needs at least 2 layers, got {}",
                topology.len()
            )));
        }
        if activations.len() != topology.len() - 1 {
            return Err(ForwardError::configuration(format!(
                "activation count mismatch: expected {}, got {}",
                topology.len() - 1,
                activations.len()
            )));
        }
        if let Some(position) = topology.iter().position(|&size| size == 0) {
            return Err(ForwardError::configuration(format!(
                "layer {position} has zero neurons"
            )));
        }

        let overflow = || ForwardError::configuration("buffer totals exceed u32 offsets");

        let mut layers = Vec::with_capacity(activations.len());
        let mut total_weights = 0u32;
        let mut total_biases = 0u32;
        let mut activation_offset = 0u32;

        for (index, (pair, activation)) in topology.windows(2).zip(activations).enumerate() {
            let (input_size, output_size) = (pair[0], pair[1]);
            let descriptor = LayerDescriptor {
                input_size,
                output_size,
                weight_offset: total_weights,
                bias_offset: total_biases,
                activation_kind: activation.code(),
                activation_input_offset: activation_offset,
                activation_output_offset: activation_offset
                    .checked_add(input_size)
                    .ok_or_else(overflow)?,
                padding: 0,
            };
            debug!(
                "Layer {index}: in={input_size} out={output_size} | weightOff={} biasOff={} inputOff={} outputOff={} activation={activation:?}",
                descriptor.weight_offset,
                descriptor.bias_offset,
                descriptor.activation_input_offset,
                descriptor.activation_output_offset,
            );
            layers.push(descriptor);

            activation_offset = descriptor.activation_output_offset;
            total_weights = input_size
                .checked_mul(output_size)
                .and_then(|count| total_weights.checked_add(count))
                .ok_or_else(overflow)?;
            total_biases = total_biases.checked_add(output_size).ok_or_else(overflow)?;
        }

        // The running offset stops at the last layer's input slice.
        let total_neurons = activation_offset
            .checked_add(*topology.last().unwrap_or(&0))
            .ok_or_else(overflow)?;

        info!(
            "Planned layout: {} layers, {} neurons, {} weights, {} biases",
            layers.len(),
            total_neurons,
            total_weights,
            total_biases
        );

        Ok(Self {
            topology: topology.to_vec(),
            layers,
            total_weights,
            total_biases,
            total_neurons,
        })
    }

    pub fn topology(&self) -> &[u32] {
        &self.topology
    }

    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn total_weights(&self) -> usize {
        self.total_weights as usize
    }

    pub fn total_biases(&self) -> usize {
        self.total_biases as usize
    }

    /// Total activation elements, output layer included.
    pub fn total_neurons(&self) -> usize {
        self.total_neurons as usize
    }

    /// Width of the input layer.
    pub fn input_size(&self) -> usize {
        self.topology[0] as usize
    }

    /// Width of the output layer.
    pub fn output_size(&self) -> usize {
        self.topology[self.topology.len() - 1] as usize
    }

    /// Element offset of the output slice in the activation buffer.
    pub fn output_offset(&self) -> usize {
        self.total_neurons() - self.output_size()
    }

    /// Descriptor table as bytes, ready for a device upload.
    pub fn descriptor_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELU_RELU: [ActivationKind; 2] = [ActivationKind::Relu, ActivationKind::Relu];

    #[test]
    fn test_layer_descriptor_size() {
        assert_eq!(size_of::<LayerDescriptor>(), LayerDescriptor::SIZE_BYTES);
        assert_eq!(LayerDescriptor::SIZE_BYTES, LayerDescriptor::SIZE_U32S * 4);
    }

    #[test]
    fn test_xor_layout() {
        let layout = NetworkLayout::plan(&[2, 2, 1], &RELU_RELU).unwrap();

        assert_eq!(layout.layer_count(), 2);
        assert_eq!(layout.total_weights(), 6);
        assert_eq!(layout.total_biases(), 3);
        assert_eq!(layout.total_neurons(), 5);
        assert_eq!(layout.output_offset(), 4);

        let first = layout.layers()[0];
        assert_eq!(first.input_size, 2);
        assert_eq!(first.output_size, 2);
        assert_eq!(first.weight_offset, 0);
        assert_eq!(first.bias_offset, 0);
        assert_eq!(first.activation_input_offset, 0);
        assert_eq!(first.activation_output_offset, 2);

        let second = layout.layers()[1];
        assert_eq!(second.weight_offset, 4);
        assert_eq!(second.bias_offset, 2);
        assert_eq!(second.activation_input_offset, 2);
        assert_eq!(second.activation_output_offset, 4);
        assert_eq!(second.padding, 0);
    }

    #[test]
    fn test_weight_index_is_row_major_by_output() {
        let activations = [ActivationKind::Relu, ActivationKind::Sigmoid];
        let layout = NetworkLayout::plan(&[3, 4, 2], &activations).unwrap();
        let second = layout.layers()[1];
        assert_eq!(second.weight_offset, 12);
        // output 1, input 2 -> 12 + 1 * 4 + 2
        assert_eq!(second.weight_index(1, 2), 18);
        assert_eq!(second.weight_count(), 8);
    }

    #[test]
    fn test_activation_codes_are_stored() {
        let activations = [
            ActivationKind::Tanh,
            ActivationKind::Identity,
            ActivationKind::Sigmoid,
        ];
        let layout = NetworkLayout::plan(&[1, 1, 1, 1], &activations).unwrap();
        let kinds: Vec<ActivationKind> = layout
            .layers()
            .iter()
            .map(|layer| layer.activation().unwrap())
            .collect();
        assert_eq!(kinds, activations);
    }

    #[test]
    fn test_descriptor_bytes_stride() {
        let layout = NetworkLayout::plan(&[4, 3, 2], &RELU_RELU).unwrap();
        let bytes = layout.descriptor_bytes();
        assert_eq!(bytes.len(), 2 * LayerDescriptor::SIZE_BYTES);
        // Second record's input_size (3) starts at byte 32.
        assert_eq!(&bytes[32..36], &3u32.to_ne_bytes());
    }

    #[test]
    fn test_rejects_short_topology() {
        let result = NetworkLayout::plan(&[4], &[]);
        assert!(matches!(result, Err(ForwardError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_activation_arity_mismatch() {
        let result = NetworkLayout::plan(&[2, 2, 1], &[ActivationKind::Relu]);
        assert!(matches!(result, Err(ForwardError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_zero_width_layer() {
        let result = NetworkLayout::plan(&[2, 0, 1], &RELU_RELU);
        assert!(matches!(result, Err(ForwardError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_overflowing_totals() {
        let result = NetworkLayout::plan(&[u32::MAX, u32::MAX], &[ActivationKind::Identity]);
        assert!(matches!(result, Err(ForwardError::Configuration { .. })));
    }
}
