//! Renderer crate for spinfield, an animated field of tiled circles.
//!
//! The crate compiles a GLSL program, feeds it a small set of per-frame inputs,
//! and draws a full-screen quad into a `winit` window through `wgpu`. The
//! overall flow is:
//!
//! ```text
//!   CLI / spinfield
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ ProgramBuilder::build ──▶ BuildReport
//!          │                                       │
//!          ▼                                       ▼
//!   winit event loop ──▶ RenderState ──▶ FrameScheduler::frame ──▶ GpuState
//!     (resize, touch,      (viewport,       (time, resolution,       (clear,
//!      cursor)              pointers)        pointers → UBO)          draw 6)
//! ```
//!
//! Everything above the GPU boundary is plain data: programs are validated
//! with naga, uniforms are packed into a CPU-side std140 image, and the
//! scheduler talks to the GPU only through [`RenderBackend`]. Shader problems
//! are logged and leave the window clearing to black rather than aborting.

mod geometry;
mod gpu;
pub mod pointer;
pub mod program;
pub mod runtime;
mod types;
pub mod uniforms;
pub mod viewport;
mod window;

use anyhow::Result;

pub use geometry::{VertexLayout, FULLSCREEN_QUAD, QUAD_VERTEX_COUNT};
pub use pointer::{PointerDevice, PointerTracker, TouchPoint, POINTER_CAPACITY};
pub use program::{BuildReport, ProgramBuilder, ShaderDiagnostic, ShaderProgram, StageKind};
pub use runtime::{
    CancelToken, DrawCall, FrameScheduler, FrameSubmission, RenderBackend, RenderState,
    SystemTimeSource, TimeSample, TimeSource,
};
pub use types::{
    Antialiasing, ColorSpaceMode, RendererConfig, ShaderSources, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER,
};
pub use uniforms::{UniformChannel, UniformIssue, UniformLocation, UniformPolicy};
pub use viewport::{ViewportDimensions, ViewportManager, WindowMetrics};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    /// Builds a renderer for the supplied configuration.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Compiles and links the configured program without opening a window.
    pub fn check(&self) -> BuildReport {
        ProgramBuilder::new(self.config.uniform_policy).build(&self.config.shaders)
    }

    /// Opens the window and renders until it is closed.
    ///
    /// Shader diagnostics never end up here; they are logged and the window
    /// keeps presenting cleared frames. Errors come from the platform (no
    /// display, no adapter) or a fatal surface condition.
    pub fn run(&mut self) -> Result<()> {
        let report = self.check();
        if !report.is_renderable() {
            tracing::warn!(
                diagnostics = report.diagnostics.len(),
                "no usable shader program; frames will only be cleared"
            );
        }
        window::run_window(&self.config, report)
    }
}
