//! Device ownership and the blocking helpers every GPU call goes through.

use std::sync::Arc;

use log::info;
use pollster::FutureExt;

use crate::errors::{ForwardError, ForwardResult};

/// Adapter, device and queue shared by a buffer store and its dispatcher.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    timestamps_supported: bool,
}

impl GpuContext {
    /// Request the default adapter and a device with its full limits.
    ///
    /// `TIMESTAMP_QUERY` is enabled whenever the adapter offers it so stage
    /// profiling can use device timers.
    pub async fn new() -> ForwardResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok_or_else(|| ForwardError::device("adapter request", "no compatible adapter"))?;

        let required_features = adapter.features() & wgpu::Features::TIMESTAMP_QUERY;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("NeuraVis Compute Device"),
                    required_features,
                    required_limits: adapter.limits(),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| ForwardError::device("device request", e.to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            "GPU context ready: {} ({:?}), timestamp queries {}",
            adapter_info.name,
            adapter_info.backend,
            if required_features.is_empty() {
                "unavailable"
            } else {
                "enabled"
            }
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
            timestamps_supported: !required_features.is_empty(),
        })
    }

    /// Blocking variant of [`GpuContext::new`], wrapped for sharing.
    pub fn new_blocking() -> ForwardResult<Arc<Self>> {
        Self::new().block_on().map(Arc::new)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn supports_timestamps(&self) -> bool {
        self.timestamps_supported
    }

    /// Block until all submitted work has finished executing.
    ///
    /// Every write made by that work is visible to later submissions and to
    /// host mappings once this returns.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Run `f` with validation and out-of-memory errors captured.
    pub(crate) fn with_error_scope<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = self.device.pop_error_scope().block_on();
        let out_of_memory = self.device.pop_error_scope().block_on();
        match validation.or(out_of_memory) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    /// Copy `dest.len()` elements starting at `offset_bytes` of `source` back to the host.
    ///
    /// `source` needs `COPY_SRC` usage. Blocks until the copy has landed.
    pub(crate) fn read_buffer<T: bytemuck::Pod>(
        &self,
        source: &wgpu::Buffer,
        offset_bytes: u64,
        dest: &mut [T],
    ) -> ForwardResult<()> {
        if dest.is_empty() {
            return Ok(());
        }
        let size = std::mem::size_of_val(dest) as u64;

        let staging = self
            .with_error_scope(|device| {
                let staging = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Readback Staging Buffer"),
                    size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Readback Encoder"),
                });
                encoder.copy_buffer_to_buffer(source, offset_bytes, &staging, 0, size);
                self.queue.submit(Some(encoder.finish()));
                staging
            })
            .map_err(|e| ForwardError::device("readback copy", e.to_string()))?;

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.wait_idle();

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ForwardError::device("readback map", e.to_string())),
            Err(_) => {
                return Err(ForwardError::device(
                    "readback map",
                    "map callback was dropped",
                ));
            }
        }

        let data = slice.get_mapped_range();
        dest.copy_from_slice(bytemuck::cast_slice(&data));
        drop(data);
        staging.unmap();
        Ok(())
    }
}
