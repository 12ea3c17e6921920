//! Layered forward passes for fully-connected networks on the GPU.
//!
//! This library lays out a network's weights, biases and activations in flat
//! device buffers and runs the forward pass one layer at a time, with a
//! barrier after every layer. Callers can run the whole pass or stop after any
//! single layer to inspect intermediate activations.

pub mod activation;
pub mod errors;
pub mod gpu;
pub mod host_reference;
pub mod layout;
pub mod network_config;

pub use activation::ActivationKind;
pub use errors::{ForwardError, ForwardResult};
pub use host_reference::HostReference;
pub use layout::{LayerDescriptor, NetworkLayout};
pub use network_config::NetworkConfig;
