//! Offset-table properties across many topologies.

use neuravis_compute::activation::ActivationKind;
use neuravis_compute::layout::{LayerDescriptor, NetworkLayout};

const KINDS: [ActivationKind; 4] = [
    ActivationKind::Relu,
    ActivationKind::Sigmoid,
    ActivationKind::Tanh,
    ActivationKind::Identity,
];

/// Deterministic topologies of 2..=7 layers with widths 1..=64.
fn generate_topologies(count: usize) -> Vec<Vec<u32>> {
    let mut seed: u64 = 12345;
    let mut next = move |modulus: u64| {
        // LCG random number generator
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (seed >> 33) % modulus
    };

    (0..count)
        .map(|_| {
            let depth = 2 + next(6) as usize;
            (0..depth).map(|_| 1 + next(64) as u32).collect()
        })
        .collect()
}

fn plan(topology: &[u32]) -> NetworkLayout {
    let activations: Vec<ActivationKind> = (0..topology.len() - 1)
        .map(|i| KINDS[i % KINDS.len()])
        .collect();
    NetworkLayout::plan(topology, &activations).unwrap()
}

#[test]
fn test_totals_match_per_layer_sums() {
    for topology in generate_topologies(200) {
        let layout = plan(&topology);

        let weights: usize = layout
            .layers()
            .iter()
            .map(LayerDescriptor::weight_count)
            .sum();
        let biases: usize = layout
            .layers()
            .iter()
            .map(|layer| layer.output_size as usize)
            .sum();
        let neurons: usize = topology.iter().map(|&size| size as usize).sum();

        assert_eq!(weights, layout.total_weights(), "{topology:?}");
        assert_eq!(biases, layout.total_biases(), "{topology:?}");
        assert_eq!(neurons, layout.total_neurons(), "{topology:?}");
        assert_eq!(layout.layer_count(), topology.len() - 1);
    }
}

#[test]
fn test_activation_slices_chain() {
    for topology in generate_topologies(200) {
        let layout = plan(&topology);
        let layers = layout.layers();

        assert_eq!(layers[0].activation_input_offset, 0);
        for layer in layers {
            assert_eq!(
                layer.activation_output_offset,
                layer.activation_input_offset + layer.input_size,
                "{topology:?}"
            );
        }
        for pair in layers.windows(2) {
            assert_eq!(
                pair[1].activation_input_offset, pair[0].activation_output_offset,
                "{topology:?}"
            );
        }

        let last = layers[layers.len() - 1];
        let output_offset = last.activation_output_offset as usize;
        let output_end = output_offset + last.output_size as usize;
        assert_eq!(output_end, layout.total_neurons());
        assert_eq!(layout.output_offset(), output_offset);
    }
}

#[test]
fn test_parameter_offsets_accumulate() {
    for topology in generate_topologies(200) {
        let layout = plan(&topology);

        let mut expected_weight_offset = 0u32;
        let mut expected_bias_offset = 0u32;
        let mut expected_input_offset = 0u32;
        for (i, layer) in layout.layers().iter().enumerate() {
            assert_eq!(layer.input_size, topology[i]);
            assert_eq!(layer.output_size, topology[i + 1]);
            assert_eq!(layer.weight_offset, expected_weight_offset);
            assert_eq!(layer.bias_offset, expected_bias_offset);
            assert_eq!(layer.activation_input_offset, expected_input_offset);
            assert_eq!(layer.padding, 0);

            expected_weight_offset += layer.input_size * layer.output_size;
            expected_bias_offset += layer.output_size;
            expected_input_offset += topology[i];
        }
    }
}

#[test]
fn test_weight_rows_tile_the_layer_block() {
    let layout = plan(&[3, 5, 2]);
    for layer in layout.layers() {
        let first = layer.weight_index(0, 0);
        let last = layer.weight_index(layer.output_size - 1, layer.input_size - 1);
        assert_eq!(first, layer.weight_offset as usize);
        assert_eq!(last - first + 1, layer.weight_count());
    }
}

#[test]
fn test_descriptor_table_bytes() {
    let layout = plan(&[4, 8, 8, 2]);
    let bytes = layout.descriptor_bytes();
    let expected_len = layout.layer_count() * LayerDescriptor::SIZE_BYTES;
    assert_eq!(bytes.len(), expected_len);

    let decoded: &[LayerDescriptor] = bytemuck::cast_slice(bytes);
    assert_eq!(decoded, layout.layers());
}
