//! GPU backend for the frame scheduler.
//!
//! - `context` owns the wgpu instance, device, and surface, and rebuilds the
//!   swapchain when the window resizes.
//! - `pipeline` turns a linked [`ShaderProgram`](crate::program::ShaderProgram)
//!   into a render pipeline with a single uniform bind group layout.
//! - `state` implements [`RenderBackend`](crate::runtime::RenderBackend):
//!   upload the uniform block, clear, draw the quad, present.

mod context;
mod pipeline;
mod state;

pub(crate) use state::GpuState;
