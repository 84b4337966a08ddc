use anyhow::{anyhow, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};

use crate::geometry::{GeometryBuffer, FULLSCREEN_QUAD};
use crate::program::{ShaderDiagnostic, ShaderProgram};
use crate::runtime::{FrameSubmission, RenderBackend};
use crate::types::{Antialiasing, ColorSpaceMode};
use crate::viewport::ViewportDimensions;

use super::context::GpuContext;
use super::pipeline::ProgramPipeline;

/// Smallest uniform buffer the device will bind.
const MIN_UNIFORM_BUFFER_SIZE: u64 = 16;

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        (width, height): (u32, u32),
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Everything needed to issue the program's draw.
struct DrawResources {
    pipeline: ProgramPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: Option<wgpu::BindGroup>,
    geometry: Option<GeometryBuffer>,
}

impl DrawResources {
    fn new(
        context: &GpuContext,
        program: &ShaderProgram,
        uniform_size: usize,
    ) -> Result<Self, ShaderDiagnostic> {
        let pipeline = ProgramPipeline::new(
            &context.device,
            program,
            context.surface_format,
            context.sample_count,
        )?;

        let size = (uniform_size as u64).max(MIN_UNIFORM_BUFFER_SIZE);
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: wgpu::util::align_to(size, MIN_UNIFORM_BUFFER_SIZE),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = pipeline.uniform_layout.as_ref().map(|binding| {
            context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &binding.layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: binding.binding,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            })
        });

        let geometry = program
            .position_location()
            .map(|_| GeometryBuffer::upload(&context.device, &FULLSCREEN_QUAD));

        Ok(Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            geometry,
        })
    }
}

/// GPU side of the renderer: surface, pipeline, and per-frame encoding.
pub(crate) struct GpuState {
    context: GpuContext,
    draw: Option<DrawResources>,
    multisample_target: Option<MultisampleTarget>,
}

impl GpuState {
    /// Creates the device and, when a program is available, its pipeline.
    ///
    /// A pipeline the device rejects is reported and the state falls back to
    /// clearing every frame.
    pub(crate) fn new<T>(
        target: T,
        viewport: ViewportDimensions,
        program: Option<&ShaderProgram>,
        uniform_size: usize,
        antialiasing: Antialiasing,
        color_space: ColorSpaceMode,
    ) -> Result<(Self, Option<ShaderDiagnostic>)>
    where
        T: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
    {
        let context = GpuContext::new(target, viewport, antialiasing, color_space)?;

        let mut diagnostic = None;
        let draw = match program {
            Some(program) => match DrawResources::new(&context, program, uniform_size) {
                Ok(draw) => Some(draw),
                Err(err) => {
                    tracing::error!("{err}");
                    diagnostic = Some(err);
                    None
                }
            },
            None => None,
        };

        let multisample_target = Self::multisample_target(&context);
        debug!(
            color_space = ?context.color_space,
            sample_count = context.sample_count,
            has_pipeline = draw.is_some(),
            "gpu state ready"
        );
        Ok((
            Self {
                context,
                draw,
                multisample_target,
            },
            diagnostic,
        ))
    }

    pub(crate) fn has_pipeline(&self) -> bool {
        self.draw.is_some()
    }

    fn multisample_target(context: &GpuContext) -> Option<MultisampleTarget> {
        (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size(),
                context.sample_count,
            )
        })
    }

    fn encode(&self, view: &wgpu::TextureView, frame: &FrameSubmission<'_>) -> wgpu::CommandBuffer {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render encoder"),
            });

        let [r, g, b, a] = frame.clear_color;
        let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
            Some(msaa) => (&msaa.view, Some(view)),
            None => (view, None),
        };
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let (Some(draw), Some(call)) = (self.draw.as_ref(), frame.draw) {
                let [x, y, width, height] = frame.viewport.rect();
                let (target_width, target_height) = self.context.size();
                render_pass.set_viewport(
                    x,
                    y,
                    width.min(target_width as f32),
                    height.min(target_height as f32),
                    0.0,
                    1.0,
                );
                render_pass.set_pipeline(&draw.pipeline.pipeline);
                if let Some(bind_group) = draw.uniform_bind_group.as_ref() {
                    render_pass.set_bind_group(0, bind_group, &[]);
                }
                if let Some(geometry) = draw.geometry.as_ref() {
                    render_pass.set_vertex_buffer(0, geometry.slice());
                    debug_assert_eq!(geometry.vertex_count(), call.vertex_count);
                }
                let first = call.first_vertex;
                render_pass.draw(first..first + call.vertex_count, 0..1);
            }
        }
        encoder.finish()
    }
}

impl RenderBackend for GpuState {
    fn resize(&mut self, viewport: ViewportDimensions) {
        let ViewportDimensions { width, height, .. } = viewport;
        if !self.context.resize(width, height) {
            debug!(width, height, "ignoring zero-sized resize");
            return;
        }
        self.multisample_target = Self::multisample_target(&self.context);
        debug!(width, height, "surface resized");
    }

    fn submit(&mut self, frame: &FrameSubmission<'_>) -> Result<()> {
        if frame.viewport.is_empty() {
            return Ok(());
        }
        let surface_texture = match self.context.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("surface out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
                return Ok(());
            }
            Err(other) => {
                warn!("surface error: {other:?}; retrying next frame");
                return Ok(());
            }
        };

        if let Some(draw) = self.draw.as_ref() {
            if frame.draw.is_some() && !frame.uniforms.is_empty() {
                self.context
                    .queue
                    .write_buffer(&draw.uniform_buffer, 0, frame.uniforms);
            }
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self.encode(&view, frame);
        self.context.queue.submit(std::iter::once(commands));
        surface_texture.present();
        Ok(())
    }
}
