//! WGSL sources for the forward-pass kernel.

use std::fs;
use std::path::Path;

use crate::errors::{ForwardError, ForwardResult};
use crate::gpu::dispatcher::BindingSlots;

/// Kernel template; `{{...}}` placeholders are filled by [`forward_kernel_wgsl`].
const FORWARD_KERNEL_TEMPLATE: &str = include_str!("forward.wgsl");

/// Get the forward-pass kernel for a work-group width and binding layout.
///
/// The width must match the one the dispatcher uses to size its dispatches.
pub fn forward_kernel_wgsl(work_group_width: u32, slots: &BindingSlots) -> String {
    FORWARD_KERNEL_TEMPLATE
        .replace("{{WORK_GROUP_WIDTH}}", &work_group_width.to_string())
        .replace("{{WEIGHTS_SLOT}}", &slots.weights.to_string())
        .replace("{{BIASES_SLOT}}", &slots.biases.to_string())
        .replace("{{ACTIVATIONS_SLOT}}", &slots.activations.to_string())
        .replace("{{LAYER_TABLE_SLOT}}", &slots.layer_table.to_string())
        .replace("{{LAYER_SELECTOR_SLOT}}", &slots.layer_selector.to_string())
}

/// Read kernel source from disk.
///
/// An unreadable file is reported as a compilation failure so callers handle
/// every "no usable kernel" case the same way.
pub fn load_kernel_source(path: impl AsRef<Path>) -> ForwardResult<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|e| ForwardError::Compilation {
        message: format!("cannot read kernel source {}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_kernel_has_entry_point() {
        let wgsl = forward_kernel_wgsl(256, &BindingSlots::default());
        assert!(wgsl.contains("fn main("));
        assert!(wgsl.contains("struct LayerDescriptor"));
        assert!(!wgsl.contains("{{"));
    }

    #[test]
    fn test_work_group_width_substitution() {
        let small = forward_kernel_wgsl(64, &BindingSlots::default());
        let large = forward_kernel_wgsl(256, &BindingSlots::default());

        assert!(small.contains("@workgroup_size(64)"));
        assert!(large.contains("@workgroup_size(256)"));
    }

    #[test]
    fn test_binding_slot_substitution() {
        let slots = BindingSlots {
            weights: 5,
            biases: 6,
            activations: 7,
            layer_table: 8,
            layer_selector: 9,
        };
        let wgsl = forward_kernel_wgsl(256, &slots);
        assert!(wgsl.contains("@binding(5) var<storage, read> weights"));
        assert!(wgsl.contains("@binding(7) var<storage, read_write> activations"));
        assert!(wgsl.contains("@binding(9) var<uniform> selector"));
    }

    #[test]
    fn test_missing_kernel_file() {
        let result = load_kernel_source("/nonexistent/forward.wgsl");
        assert!(matches!(result, Err(ForwardError::Compilation { .. })));
    }
}
