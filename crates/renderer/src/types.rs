use std::borrow::Cow;

use crate::pointer::PointerDevice;
use crate::uniforms::UniformPolicy;

/// Bundled vertex stage: positions the full-screen quad in clip space.
pub const DEFAULT_VERTEX_SHADER: &str = include_str!("../shaders/fullscreen.vert");

/// Bundled fragment stage: the rotating, zooming field of tiled circles.
pub const DEFAULT_FRAGMENT_SHADER: &str = include_str!("../shaders/circles.frag");

/// Source text for both shading stages.
///
/// Any replacement fragment stage must declare the `time`, `resolution`, and
/// `pointers` members in its uniform block to keep receiving frame inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    pub fn new(
        vertex: impl Into<Cow<'static, str>>,
        fragment: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Match a browser canvas: shader output is written as-is (gamma-encoded).
    #[default]
    Auto,
    /// Treat shader outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains for conversion.
    Linear,
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    #[default]
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial window size in logical pixels.
    pub window_size: (f64, f64),
    /// Window title.
    pub title: String,
    /// Vertex and fragment stage source text.
    pub shaders: ShaderSources,
    /// Whether cursor events feed the pointer array.
    pub pointer_device: PointerDevice,
    /// How missing or mistyped uniforms are treated at startup.
    pub uniform_policy: UniformPolicy,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Desired color handling for the swapchain.
    pub color_space: ColorSpaceMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_size: (1280.0, 720.0),
            title: "spinfield".to_string(),
            shaders: ShaderSources::default(),
            pointer_device: PointerDevice::default(),
            uniform_policy: UniformPolicy::default(),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
        }
    }
}
