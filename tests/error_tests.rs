//! Tests for the error taxonomy that can be exercised without a device.

use neuravis_compute::activation::ActivationKind;
use neuravis_compute::errors::{BufferKind, ForwardError};
use neuravis_compute::gpu::{
    BindingSlots, DispatchConfig, DispatcherStatus, StageDispatcher, load_kernel_source,
};
use neuravis_compute::host_reference::HostReference;
use neuravis_compute::layout::NetworkLayout;

#[cfg(test)]
mod configuration_error_tests {
    use super::*;

    #[test]
    fn test_single_layer_topology() {
        let result = NetworkLayout::plan(&[3], &[]);
        assert!(matches!(result, Err(ForwardError::Configuration { .. })));
    }

    #[test]
    fn test_too_many_activations() {
        let activations = [ActivationKind::Relu, ActivationKind::Relu];
        let result = NetworkLayout::plan(&[2, 1], &activations);
        match result {
            Err(ForwardError::Configuration { reason }) => {
                assert!(reason.contains("expected 1, got 2"), "{reason}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_config_validation() {
        let duplicate = BindingSlots {
            biases: 0,
            ..Default::default()
        };
        assert!(matches!(
            DispatchConfig::new().with_binding_slots(duplicate).validate(),
            Err(ForwardError::Configuration { .. })
        ));
    }
}

#[cfg(test)]
mod size_mismatch_tests {
    use super::*;

    fn xor_layout() -> NetworkLayout {
        let activations = [ActivationKind::Relu, ActivationKind::Relu];
        NetworkLayout::plan(&[2, 2, 1], &activations).unwrap()
    }

    #[test]
    fn test_short_weights() {
        let result = HostReference::new(xor_layout(), &[1.0; 5], &[0.0; 3]);
        assert!(matches!(
            result,
            Err(ForwardError::SizeMismatch {
                buffer: BufferKind::Weights,
                expected: 6,
                actual: 5,
            })
        ));
    }

    #[test]
    fn test_wrong_input_width_leaves_activations() {
        let mut reference = HostReference::new(xor_layout(), &[1.0; 6], &[0.0; 3]).unwrap();
        reference.set_inputs(&[0.25, 0.75]).unwrap();

        let result = reference.set_inputs(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(ForwardError::SizeMismatch {
                buffer: BufferKind::Inputs,
                expected: 2,
                actual: 3,
            })
        ));
        assert_eq!(&reference.activations()[..2], &[0.25, 0.75]);
    }

    #[test]
    fn test_error_message_names_buffer() {
        let error = ForwardError::SizeMismatch {
            buffer: BufferKind::Biases,
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            error.to_string(),
            "Size mismatch for biases: expected 3 elements, got 2"
        );
    }
}

#[cfg(test)]
mod dispatcher_error_tests {
    use super::*;

    #[test]
    fn test_unbound_dispatcher() {
        let mut dispatcher = StageDispatcher::new(DispatchConfig::default());
        assert_eq!(dispatcher.status(), DispatcherStatus::Unbound);
        assert_eq!(dispatcher.layer_count(), 0);
        assert!(dispatcher.failure().is_none());
        assert!(matches!(
            dispatcher.forward_layer(0),
            Err(ForwardError::DispatcherNotReady)
        ));
    }

    #[test]
    fn test_unreadable_kernel_source() {
        let result = load_kernel_source("/nonexistent/forward.wgsl");
        match result {
            Err(ForwardError::Compilation { message }) => {
                assert!(message.contains("forward.wgsl"), "{message}");
            }
            other => panic!("expected compilation error, got {other:?}"),
        }
    }

    #[test]
    fn test_index_error_message() {
        let error = ForwardError::IndexOutOfRange {
            index: 2,
            layer_count: 2,
        };
        assert_eq!(error.to_string(), "Layer index 2 out of range for 2 layers");
    }
}
