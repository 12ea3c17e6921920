//! Per-stage timing for the dispatcher.
//!
//! Reading a timer blocks the caller until the stage's timestamps resolve, so
//! profiling is meant for debugging runs only.

use std::time::Duration;

use log::warn;

use crate::errors::ForwardResult;
use crate::gpu::context::GpuContext;

const TIMESTAMP_COUNT: u32 = 2;

pub(crate) enum StageTimer {
    /// Begin/end timestamps written by the compute pass itself.
    Timestamps {
        query_set: wgpu::QuerySet,
        resolve_buffer: wgpu::Buffer,
    },
    /// Host time around submit and wait.
    WallClock,
}

impl StageTimer {
    pub(crate) fn new(context: &GpuContext) -> Self {
        if !context.supports_timestamps() {
            warn!("Device lacks TIMESTAMP_QUERY; profiling uses host wall-clock time");
            return StageTimer::WallClock;
        }

        let created = context.with_error_scope(|device| {
            let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("Stage Timer Queries"),
                ty: wgpu::QueryType::Timestamp,
                count: TIMESTAMP_COUNT,
            });
            let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Stage Timer Resolve Buffer"),
                size: TIMESTAMP_COUNT as u64 * wgpu::QUERY_SIZE as u64,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            (query_set, resolve_buffer)
        });

        match created {
            Ok((query_set, resolve_buffer)) => StageTimer::Timestamps {
                query_set,
                resolve_buffer,
            },
            Err(e) => {
                warn!("Failed to create timestamp queries ({e}); using host wall-clock time");
                StageTimer::WallClock
            }
        }
    }

    pub(crate) fn pass_writes(&self) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        match self {
            StageTimer::Timestamps { query_set, .. } => Some(wgpu::ComputePassTimestampWrites {
                query_set,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: Some(1),
            }),
            StageTimer::WallClock => None,
        }
    }

    /// Record the resolve of this stage's timestamps into `encoder`.
    pub(crate) fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        if let StageTimer::Timestamps {
            query_set,
            resolve_buffer,
        } = self
        {
            encoder.resolve_query_set(query_set, 0..TIMESTAMP_COUNT, resolve_buffer, 0);
        }
    }

    /// Elapsed time of the last recorded stage in milliseconds.
    pub(crate) fn elapsed_ms(
        &self,
        context: &GpuContext,
        wall_clock: Duration,
    ) -> ForwardResult<f32> {
        match self {
            StageTimer::Timestamps { resolve_buffer, .. } => {
                let mut ticks = [0u64; TIMESTAMP_COUNT as usize];
                context.read_buffer(resolve_buffer, 0, &mut ticks)?;
                let nanos = ticks[1].saturating_sub(ticks[0]) as f64
                    * context.queue().get_timestamp_period() as f64;
                Ok((nanos / 1_000_000.0) as f32)
            }
            StageTimer::WallClock => Ok(wall_clock.as_secs_f32() * 1000.0),
        }
    }
}
