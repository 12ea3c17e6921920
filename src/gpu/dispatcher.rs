//! Layer-by-layer execution of the forward kernel.
//!
//! Every stage is encoded into its own command buffer, submitted, and waited
//! on before the call returns. Running `forward_layer(i)` then
//! `forward_layer(i + 1)` therefore sees exactly the data `forward()` would,
//! and the caller may read activations between stages.

use std::time::Instant;

use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::errors::{ForwardError, ForwardResult};
use crate::gpu::buffer_store::{BufferStore, storage_layout_entry};
use crate::gpu::profiler::StageTimer;
use crate::gpu::shaders::forward_kernel_wgsl;

/// Invocations per work-group; must match the kernel's `@workgroup_size`.
pub const DEFAULT_WORK_GROUP_WIDTH: u32 = 256;

/// Number of work-groups needed to cover `output_size` neurons.
pub fn work_group_count(output_size: u32, work_group_width: u32) -> u32 {
    output_size.div_ceil(work_group_width)
}

/// Binding numbers (group 0) of every resource the kernel reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlots {
    pub weights: u32,
    pub biases: u32,
    pub activations: u32,
    pub layer_table: u32,
    pub layer_selector: u32,
}

impl Default for BindingSlots {
    fn default() -> Self {
        Self {
            weights: 0,
            biases: 1,
            activations: 2,
            layer_table: 3,
            layer_selector: 4,
        }
    }
}

impl BindingSlots {
    fn as_array(&self) -> [u32; 5] {
        [
            self.weights,
            self.biases,
            self.activations,
            self.layer_table,
            self.layer_selector,
        ]
    }

    fn validate(&self) -> ForwardResult<()> {
        let slots = self.as_array();
        for (i, slot) in slots.iter().enumerate() {
            if slots[i + 1..].contains(slot) {
                return Err(ForwardError::configuration(format!(
                    "binding slot {slot} is used twice"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    work_group_width: u32,
    profiling: bool,
    slots: BindingSlots,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self {
            work_group_width: DEFAULT_WORK_GROUP_WIDTH,
            profiling: false,
            slots: BindingSlots::default(),
        }
    }

    pub fn with_work_group_width(mut self, width: u32) -> Self {
        self.work_group_width = width;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    pub fn with_binding_slots(mut self, slots: BindingSlots) -> Self {
        self.slots = slots;
        self
    }

    pub fn work_group_width(&self) -> u32 {
        self.work_group_width
    }

    pub fn profiling(&self) -> bool {
        self.profiling
    }

    pub fn binding_slots(&self) -> &BindingSlots {
        &self.slots
    }

    pub fn validate(&self) -> ForwardResult<()> {
        if self.work_group_width == 0 {
            return Err(ForwardError::configuration(
                "work-group width must be greater than 0",
            ));
        }
        self.slots.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherStatus {
    /// No kernel compiled yet.
    Unbound,
    /// Kernel compiled and bound to a store.
    Ready,
    /// The last initialization failed; the dispatcher cannot run.
    Failed,
}

/// Uniform block selecting the layer a dispatch computes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct LayerSelector {
    index: u32,
    padding: [u32; 3],
}

struct BoundKernel<'s> {
    store: &'s BufferStore,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    selector: wgpu::Buffer,
    // Referenced by `bind_group`.
    _layer_table: wgpu::Buffer,
    timer: Option<StageTimer>,
}

enum DispatcherState<'s> {
    Unbound,
    Ready(Box<BoundKernel<'s>>),
    Failed { message: String },
}

/// Runs the forward kernel against one [`BufferStore`], one layer per stage.
///
/// The dispatcher borrows its store, so the store cannot be re-initialized or
/// dropped while the dispatcher exists. It keeps no cursor; callers choose
/// which layer to run next.
pub struct StageDispatcher<'s> {
    config: DispatchConfig,
    state: DispatcherState<'s>,
    last_execution_time_ms: Option<f32>,
}

impl<'s> StageDispatcher<'s> {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            state: DispatcherState::Unbound,
            last_execution_time_ms: None,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn status(&self) -> DispatcherStatus {
        match self.state {
            DispatcherState::Unbound => DispatcherStatus::Unbound,
            DispatcherState::Ready(_) => DispatcherStatus::Ready,
            DispatcherState::Failed { .. } => DispatcherStatus::Failed,
        }
    }

    /// Diagnostic of the failed initialization, if any.
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            DispatcherState::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// Number of layers in the bound store; 0 unless ready.
    pub fn layer_count(&self) -> usize {
        match &self.state {
            DispatcherState::Ready(kernel) => kernel.store.layer_count(),
            _ => 0,
        }
    }

    /// Compile the built-in kernel for this configuration and bind `store`.
    pub fn initialize_builtin(&mut self, store: &'s BufferStore) -> ForwardResult<()> {
        let source = forward_kernel_wgsl(self.config.work_group_width, &self.config.slots);
        self.initialize(&source, store)
    }

    /// Compile `kernel_source` (WGSL) and bind it to `store`.
    ///
    /// Uploads the store's descriptor table to a read-only device buffer. A
    /// compilation or pipeline failure moves the dispatcher to
    /// [`DispatcherStatus::Failed`] and releases any previously bound kernel.
    pub fn initialize(&mut self, kernel_source: &str, store: &'s BufferStore) -> ForwardResult<()> {
        self.config.validate()?;
        let layout = store.layout().ok_or(ForwardError::StoreUnbound)?;
        let context = store.context();
        let slots = self.config.slots;

        let compiled = context.with_error_scope(|device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Forward Kernel"),
                source: wgpu::ShaderSource::Wgsl(kernel_source.into()),
            });

            let [weights, biases, activations] =
                BufferStore::layout_entries(slots.weights, slots.biases, slots.activations);
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Forward Bind Group Layout"),
                    entries: &[
                        weights,
                        biases,
                        activations,
                        storage_layout_entry(slots.layer_table, true),
                        wgpu::BindGroupLayoutEntry {
                            binding: slots.layer_selector,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Forward Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Forward Pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
            (pipeline, bind_group_layout)
        });

        let (pipeline, bind_group_layout) = match compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                let message = e.to_string();
                self.state = DispatcherState::Failed {
                    message: message.clone(),
                };
                return Err(ForwardError::Compilation { message });
            }
        };

        let bound = context.with_error_scope(|device| {
            let layer_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Layer Table Buffer"),
                contents: layout.descriptor_bytes(),
                usage: wgpu::BufferUsages::STORAGE,
            });
            let selector = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Layer Selector Buffer"),
                contents: bytemuck::bytes_of(&LayerSelector::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            (layer_table, selector)
        });
        let (layer_table, selector) = match bound {
            Ok(buffers) => buffers,
            Err(e) => {
                let message = e.to_string();
                self.state = DispatcherState::Failed {
                    message: message.clone(),
                };
                return Err(ForwardError::device("layer table upload", message));
            }
        };

        let mut entries = store
            .bind(slots.weights, slots.biases, slots.activations)?
            .to_vec();
        entries.push(wgpu::BindGroupEntry {
            binding: slots.layer_table,
            resource: layer_table.as_entire_binding(),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: slots.layer_selector,
            resource: selector.as_entire_binding(),
        });
        let bind_group = context
            .with_error_scope(|device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Forward Bind Group"),
                    layout: &bind_group_layout,
                    entries: &entries,
                })
            })
            .map_err(|e| {
                let message = e.to_string();
                self.state = DispatcherState::Failed {
                    message: message.clone(),
                };
                ForwardError::device("bind group creation", message)
            })?;

        let timer = self.config.profiling.then(|| StageTimer::new(context));
        self.state = DispatcherState::Ready(Box::new(BoundKernel {
            store,
            pipeline,
            bind_group,
            selector,
            _layer_table: layer_table,
            timer,
        }));
        self.last_execution_time_ms = None;

        info!(
            "Neural compute initialized: {} layers, work-group width {}",
            layout.layer_count(),
            self.config.work_group_width
        );
        Ok(())
    }

    /// Turn stage timing on or off. Takes effect immediately when ready.
    pub fn set_profiling_enabled(&mut self, enabled: bool) {
        self.config.profiling = enabled;
        if let DispatcherState::Ready(kernel) = &mut self.state {
            let store = kernel.store;
            kernel.timer = enabled.then(|| StageTimer::new(store.context()));
        }
        if !enabled {
            self.last_execution_time_ms = None;
        }
    }

    /// Time of the last `forward` or `forward_layer` call, when profiling.
    pub fn last_execution_time_ms(&self) -> Option<f32> {
        self.last_execution_time_ms
    }

    /// Run every layer in ascending order, waiting on each stage.
    pub fn forward(&mut self) -> ForwardResult<()> {
        let kernel = ready_kernel(&self.state)?;
        let mut total_ms: Option<f32> = None;
        for index in 0..kernel.store.layer_count() {
            if let Some(ms) = run_stage(kernel, self.config.work_group_width, index)? {
                *total_ms.get_or_insert(0.0) += ms;
            }
        }
        self.last_execution_time_ms = total_ms;
        Ok(())
    }

    /// Run exactly one layer and wait until its writes are visible.
    pub fn forward_layer(&mut self, index: usize) -> ForwardResult<()> {
        let kernel = ready_kernel(&self.state)?;
        self.last_execution_time_ms = run_stage(kernel, self.config.work_group_width, index)?;
        Ok(())
    }
}

fn ready_kernel<'a, 's>(state: &'a DispatcherState<'s>) -> ForwardResult<&'a BoundKernel<'s>> {
    match state {
        DispatcherState::Ready(kernel) => Ok(&**kernel),
        _ => Err(ForwardError::DispatcherNotReady),
    }
}

/// Dispatch layer `index` and block until it completes.
///
/// Returns the stage time when profiling.
fn run_stage(
    kernel: &BoundKernel<'_>,
    work_group_width: u32,
    index: usize,
) -> ForwardResult<Option<f32>> {
    let layers = kernel.store.layers();
    let layer = layers.get(index).ok_or(ForwardError::IndexOutOfRange {
        index,
        layer_count: layers.len(),
    })?;
    let work_groups = work_group_count(layer.output_size, work_group_width);
    let context = kernel.store.context();
    let limits = context.device().limits();
    if work_groups > limits.max_compute_workgroups_per_dimension {
        return Err(ForwardError::configuration(format!(
            "layer {index} needs {work_groups} work-groups of width {work_group_width}, limit {}",
            limits.max_compute_workgroups_per_dimension
        )));
    }
    let started = Instant::now();

    context
        .with_error_scope(|device| {
            let selector = LayerSelector {
                index: index as u32,
                ..Default::default()
            };
            context
                .queue()
                .write_buffer(&kernel.selector, 0, bytemuck::bytes_of(&selector));

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&format!("Forward Layer {index} Encoder")),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(&format!("Forward Layer {index} Pass")),
                    timestamp_writes: kernel.timer.as_ref().and_then(StageTimer::pass_writes),
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &kernel.bind_group, &[]);
                pass.dispatch_workgroups(work_groups, 1, 1);
            }
            if let Some(timer) = &kernel.timer {
                timer.resolve(&mut encoder);
            }
            context.queue().submit(Some(encoder.finish()));

            // Stage barrier: nothing after this call may observe a partial layer.
            context.wait_idle();
        })
        .map_err(|e| ForwardError::device(format!("layer {index} dispatch"), e.to_string()))?;

    debug!(
        "Layer {index}: dispatched {work_groups} work-groups for {} outputs",
        layer.output_size
    );

    match &kernel.timer {
        Some(timer) => timer.elapsed_ms(context, started.elapsed()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_group_count() {
        assert_eq!(work_group_count(1, 256), 1);
        assert_eq!(work_group_count(256, 256), 1);
        assert_eq!(work_group_count(257, 256), 2);
        assert_eq!(work_group_count(1000, 64), 16);
    }

    #[test]
    fn test_layer_selector_is_uniform_sized() {
        assert_eq!(std::mem::size_of::<LayerSelector>(), 16);
    }

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.work_group_width(), DEFAULT_WORK_GROUP_WIDTH);
        assert!(!config.profiling());
        assert_eq!(config.binding_slots(), &BindingSlots::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_width() {
        let config = DispatchConfig::new().with_work_group_width(0);
        assert!(matches!(
            config.validate(),
            Err(ForwardError::Configuration { .. })
        ));
    }

    #[test]
    fn test_config_rejects_duplicate_slots() {
        let slots = BindingSlots {
            layer_selector: 1,
            ..Default::default()
        };
        let config = DispatchConfig::new().with_binding_slots(slots);
        assert!(matches!(
            config.validate(),
            Err(ForwardError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unbound_dispatcher_is_an_error() {
        let mut dispatcher = StageDispatcher::new(DispatchConfig::default());
        assert_eq!(dispatcher.status(), DispatcherStatus::Unbound);
        assert_eq!(dispatcher.layer_count(), 0);
        assert!(matches!(
            dispatcher.forward(),
            Err(ForwardError::DispatcherNotReady)
        ));
        assert!(matches!(
            dispatcher.forward_layer(0),
            Err(ForwardError::DispatcherNotReady)
        ));
    }
}
