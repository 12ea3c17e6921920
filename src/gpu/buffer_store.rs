//! Device-resident weights, biases and activations for one topology.
//!
//! A [`BufferStore`] owns exactly three storage buffers sized from a
//! [`NetworkLayout`]. Buffers are released when the store is dropped or
//! re-initialized; they never grow in place.
//!
//! Writes go through `Queue::write_buffer` and land before the next submission,
//! so an upload followed by a dispatch or a read is always ordered. The store
//! does no locking: callers must not read while a dispatch on the same store is
//! in flight, which the blocking dispatcher guarantees.

use std::sync::Arc;

use log::{debug, info};

use crate::activation::ActivationKind;
use crate::errors::{BufferKind, ForwardError, ForwardResult};
use crate::gpu::context::GpuContext;
use crate::layout::{LayerDescriptor, NetworkLayout};
use crate::network_config::NetworkConfig;

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;

struct StoreAllocation {
    layout: NetworkLayout,
    weights: wgpu::Buffer,
    biases: wgpu::Buffer,
    activations: wgpu::Buffer,
}

/// Flat device buffers plus the offset table that locates every layer in them.
pub struct BufferStore {
    context: Arc<GpuContext>,
    allocation: Option<StoreAllocation>,
}

impl BufferStore {
    /// Create a store with no topology bound.
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            allocation: None,
        }
    }

    /// Create and initialize a store in one step.
    pub fn with_topology(
        context: Arc<GpuContext>,
        topology: &[u32],
        activations: &[ActivationKind],
    ) -> ForwardResult<Self> {
        let mut store = Self::new(context);
        store.initialize(topology, activations)?;
        Ok(store)
    }

    /// Initialize from a configuration and upload its weights and biases.
    pub fn from_config(context: Arc<GpuContext>, config: &NetworkConfig) -> ForwardResult<Self> {
        let store = Self::with_topology(context, &config.topology, &config.activations)?;
        store.upload_weights(&config.weights)?;
        store.upload_biases(&config.biases)?;
        Ok(store)
    }

    /// Plan `topology` and allocate buffers for it.
    ///
    /// Any previous buffers are released first, so on error the store is left
    /// unbound. Buffer contents are undefined until uploaded.
    pub fn initialize(
        &mut self,
        topology: &[u32],
        activations: &[ActivationKind],
    ) -> ForwardResult<()> {
        self.allocation = None;

        let layout = NetworkLayout::plan(topology, activations)?;
        let storage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let create = |device: &wgpu::Device, label: &str, elements: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: elements as u64 * F32_BYTES,
                usage: storage,
                mapped_at_creation: false,
            })
        };

        let (weights, biases, activation_buffer) = self
            .context
            .with_error_scope(|device| {
                (
                    create(device, "Weights Buffer", layout.total_weights()),
                    create(device, "Biases Buffer", layout.total_biases()),
                    create(device, "Activations Buffer", layout.total_neurons()),
                )
            })
            .map_err(|e| ForwardError::device("buffer allocation", e.to_string()))?;

        info!(
            "Neural buffers initialized: {} neurons, {} weights, {} biases",
            layout.total_neurons(),
            layout.total_weights(),
            layout.total_biases()
        );

        self.allocation = Some(StoreAllocation {
            layout,
            weights,
            biases,
            activations: activation_buffer,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.allocation.is_some()
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    pub fn layout(&self) -> Option<&NetworkLayout> {
        self.allocation.as_ref().map(|a| &a.layout)
    }

    /// Bound topology; empty when unbound.
    pub fn topology(&self) -> &[u32] {
        self.layout().map(NetworkLayout::topology).unwrap_or(&[])
    }

    /// Layer descriptor table; empty when unbound.
    pub fn layers(&self) -> &[LayerDescriptor] {
        self.layout().map(NetworkLayout::layers).unwrap_or(&[])
    }

    pub fn layer_count(&self) -> usize {
        self.layers().len()
    }

    pub fn total_neurons(&self) -> usize {
        self.layout().map_or(0, NetworkLayout::total_neurons)
    }

    fn allocation(&self) -> ForwardResult<&StoreAllocation> {
        self.allocation.as_ref().ok_or(ForwardError::StoreUnbound)
    }

    fn write(
        &self,
        buffer: &wgpu::Buffer,
        offset_elements: usize,
        values: &[f32],
        kind: BufferKind,
    ) -> ForwardResult<()> {
        self.context
            .with_error_scope(|_| {
                self.context.queue().write_buffer(
                    buffer,
                    offset_elements as u64 * F32_BYTES,
                    bytemuck::cast_slice(values),
                );
            })
            .map_err(|e| ForwardError::device(format!("{kind} upload"), e.to_string()))?;
        debug!("Uploaded {} {kind} values", values.len());
        Ok(())
    }

    fn check_len(kind: BufferKind, expected: usize, actual: usize) -> ForwardResult<()> {
        if expected != actual {
            return Err(ForwardError::size_mismatch(kind, expected, actual));
        }
        Ok(())
    }

    /// Overwrite every weight. `values` must hold exactly the planned total.
    pub fn upload_weights(&self, values: &[f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Weights,
            allocation.layout.total_weights(),
            values.len(),
        )?;
        self.write(&allocation.weights, 0, values, BufferKind::Weights)
    }

    /// Overwrite every bias. `values` must hold exactly the planned total.
    pub fn upload_biases(&self, values: &[f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Biases,
            allocation.layout.total_biases(),
            values.len(),
        )?;
        self.write(&allocation.biases, 0, values, BufferKind::Biases)
    }

    /// Write the input slice only; every other activation keeps its value.
    ///
    /// Later layers still hold the previous pass's results until the next
    /// forward pass overwrites them. Call [`clear_activations`](Self::clear_activations)
    /// first when that matters.
    pub fn set_inputs(&self, values: &[f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Inputs,
            allocation.layout.input_size(),
            values.len(),
        )?;
        self.write(&allocation.activations, 0, values, BufferKind::Inputs)
    }

    /// Zero the whole activation buffer on the device.
    ///
    /// Writes queued afterwards (e.g. [`set_inputs`](Self::set_inputs)) land
    /// after the clear.
    pub fn clear_activations(&self) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        self.context
            .with_error_scope(|device| {
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Clear Activations Encoder"),
                });
                encoder.clear_buffer(&allocation.activations, 0, None);
                self.context.queue().submit(Some(encoder.finish()));
            })
            .map_err(|e| ForwardError::device("activations clear", e.to_string()))?;
        debug!("Cleared {} activations", allocation.layout.total_neurons());
        Ok(())
    }

    /// Overwrite every activation, e.g. with interpolated values for display.
    pub fn upload_activations(&self, values: &[f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Activations,
            allocation.layout.total_neurons(),
            values.len(),
        )?;
        self.write(&allocation.activations, 0, values, BufferKind::Activations)
    }

    pub fn read_weights_into(&self, dest: &mut [f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Weights,
            allocation.layout.total_weights(),
            dest.len(),
        )?;
        self.context.read_buffer(&allocation.weights, 0, dest)
    }

    pub fn read_weights(&self) -> ForwardResult<Vec<f32>> {
        let mut weights = vec![0.0; self.allocation()?.layout.total_weights()];
        self.read_weights_into(&mut weights)?;
        Ok(weights)
    }

    pub fn read_biases_into(&self, dest: &mut [f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Biases,
            allocation.layout.total_biases(),
            dest.len(),
        )?;
        self.context.read_buffer(&allocation.biases, 0, dest)
    }

    pub fn read_biases(&self) -> ForwardResult<Vec<f32>> {
        let mut biases = vec![0.0; self.allocation()?.layout.total_biases()];
        self.read_biases_into(&mut biases)?;
        Ok(biases)
    }

    pub fn read_all_activations_into(&self, dest: &mut [f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Activations,
            allocation.layout.total_neurons(),
            dest.len(),
        )?;
        self.context.read_buffer(&allocation.activations, 0, dest)
    }

    pub fn read_all_activations(&self) -> ForwardResult<Vec<f32>> {
        let mut activations = vec![0.0; self.allocation()?.layout.total_neurons()];
        self.read_all_activations_into(&mut activations)?;
        Ok(activations)
    }

    /// Read the trailing output-layer slice of the activation buffer.
    pub fn read_outputs_into(&self, dest: &mut [f32]) -> ForwardResult<()> {
        let allocation = self.allocation()?;
        Self::check_len(
            BufferKind::Outputs,
            allocation.layout.output_size(),
            dest.len(),
        )?;
        let offset = allocation.layout.output_offset() as u64 * F32_BYTES;
        self.context
            .read_buffer(&allocation.activations, offset, dest)
    }

    pub fn read_outputs(&self) -> ForwardResult<Vec<f32>> {
        let mut outputs = vec![0.0; self.allocation()?.layout.output_size()];
        self.read_outputs_into(&mut outputs)?;
        Ok(outputs)
    }

    /// Bind-group entries exposing the three buffers at the given slots.
    pub fn bind(
        &self,
        weight_slot: u32,
        bias_slot: u32,
        activation_slot: u32,
    ) -> ForwardResult<[wgpu::BindGroupEntry<'_>; 3]> {
        let allocation = self.allocation()?;
        Ok([
            wgpu::BindGroupEntry {
                binding: weight_slot,
                resource: allocation.weights.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: bias_slot,
                resource: allocation.biases.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: activation_slot,
                resource: allocation.activations.as_entire_binding(),
            },
        ])
    }

    /// Layout entries matching [`bind`](Self::bind): weights and biases are
    /// read-only to the kernel, activations are read-write.
    pub fn layout_entries(
        weight_slot: u32,
        bias_slot: u32,
        activation_slot: u32,
    ) -> [wgpu::BindGroupLayoutEntry; 3] {
        [
            storage_layout_entry(weight_slot, true),
            storage_layout_entry(bias_slot, true),
            storage_layout_entry(activation_slot, false),
        ]
    }
}

pub(crate) fn storage_layout_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
