use std::borrow::Cow;

use crate::geometry::VertexLayout;
use crate::program::{ShaderDiagnostic, ShaderProgram, ENTRY_POINT};

/// Render pipeline built from a linked program plus its uniform binding.
pub(crate) struct ProgramPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_layout: Option<UniformBinding>,
}

/// Bind group layout for the single uniform block at group 0.
pub(crate) struct UniformBinding {
    pub layout: wgpu::BindGroupLayout,
    pub binding: u32,
}

impl ProgramPipeline {
    /// Creates GPU modules and the pipeline for `program`.
    ///
    /// Errors raised by the device while doing so come back as a link
    /// diagnostic rather than a panic.
    pub fn new(
        device: &wgpu::Device,
        program: &ShaderProgram,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Result<Self, ShaderDiagnostic> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vertex stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(program.vertex().module().clone())),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fragment stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(program.fragment().module().clone())),
        });

        let uniform_layout = program.uniform_layout().map(|layout| UniformBinding {
            layout: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: layout.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            }),
            binding: layout.binding,
        });
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = uniform_layout
            .iter()
            .map(|binding| &binding.layout)
            .collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        let vertex_layout = program.position_location().map(VertexLayout::new);
        let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = vertex_layout
            .iter()
            .map(VertexLayout::buffer_layout)
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("program pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(ENTRY_POINT),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(ENTRY_POINT),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderDiagnostic::Link {
                log: error.to_string(),
            });
        }

        tracing::debug!(
            sample_count,
            ?surface_format,
            vertex_buffers = vertex_buffers.len(),
            "created program pipeline"
        );
        Ok(Self {
            pipeline,
            uniform_layout,
        })
    }
}
