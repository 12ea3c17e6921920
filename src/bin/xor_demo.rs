//! Headless driver for the layered forward pass.
//!
//! Runs the demo XOR network (or a JSON network given on the command line)
//! through the GPU, once stage by stage and then with full forward passes.
//!
//! Run with: RUST_LOG=info cargo run --release --bin xor_demo [-- <config.json>] [--profile]

use log::{error, info};
use neuravis_compute::gpu::{BufferStore, DispatchConfig, GpuContext, StageDispatcher};
use neuravis_compute::{ForwardError, NetworkConfig};
use std::env;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let profile = args.iter().any(|arg| arg == "--profile");
    let config_path = args.iter().find(|arg| !arg.starts_with("--"));

    let config = match config_path {
        Some(path) => match NetworkConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(1);
            }
        },
        None => NetworkConfig::xor(),
    };

    if let Err(e) = run(&config, profile) {
        error!("Forward pass failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &NetworkConfig, profile: bool) -> Result<(), ForwardError> {
    let context = GpuContext::new_blocking()?;
    let store = BufferStore::from_config(context, config)?;

    let mut dispatcher = StageDispatcher::new(DispatchConfig::new().with_profiling(profile));
    dispatcher.initialize_builtin(&store)?;

    let inputs = if config.inputs.is_empty() {
        vec![vec![0.0; store.topology()[0] as usize]]
    } else {
        config.inputs.clone()
    };

    // Stage by stage for the first sample, the way an animated view steps.
    store.clear_activations()?;
    store.set_inputs(&inputs[0])?;
    for layer in 0..dispatcher.layer_count() {
        dispatcher.forward_layer(layer)?;
        info!(
            "After layer {layer}: activations {:?}",
            store.read_all_activations()?
        );
    }

    for sample in &inputs {
        store.clear_activations()?;
        store.set_inputs(sample)?;
        dispatcher.forward()?;

        let outputs = store.read_outputs()?;
        info!("Input {sample:?} -> output {outputs:?}");
        if let Some(ms) = dispatcher.last_execution_time_ms() {
            info!("  forward pass took {ms:.3} ms");
        }
    }

    Ok(())
}
