//! GPU execution of layered forward passes using WGSL and wgpu.
//!
//! # Architecture
//!
//! A [`BufferStore`] owns three flat storage buffers (weights, biases,
//! activations) sized from a [`NetworkLayout`](crate::layout::NetworkLayout).
//! A [`StageDispatcher`] borrows one store, compiles the forward kernel, and
//! uploads the store's layer descriptor table. Each dispatch computes one
//! layer and blocks until its writes are visible, so callers can stop after
//! any layer and inspect the activations.
//!
//! # Usage
//!
//! ```ignore
//! use neuravis_compute::gpu::{BufferStore, DispatchConfig, GpuContext, StageDispatcher};
//! use neuravis_compute::NetworkConfig;
//!
//! let context = GpuContext::new_blocking()?;
//! let store = BufferStore::from_config(context, &NetworkConfig::xor())?;
//!
//! let mut dispatcher = StageDispatcher::new(DispatchConfig::default());
//! dispatcher.initialize_builtin(&store)?;
//!
//! store.set_inputs(&[0.0, 1.0])?;
//! dispatcher.forward()?;
//! let outputs = store.read_outputs()?;
//! ```

pub mod buffer_store;
pub mod context;
pub mod dispatcher;
mod profiler;
pub mod shaders;

pub use buffer_store::BufferStore;
pub use context::GpuContext;
pub use dispatcher::{
    BindingSlots, DEFAULT_WORK_GROUP_WIDTH, DispatchConfig, DispatcherStatus, StageDispatcher,
    work_group_count,
};
pub use shaders::{forward_kernel_wgsl, load_kernel_source};
