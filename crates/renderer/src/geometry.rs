use wgpu::util::DeviceExt;

/// Two triangles covering clip space `[-1, 1] x [-1, 1]`.
pub const FULLSCREEN_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

pub const QUAD_VERTEX_COUNT: u32 = FULLSCREEN_QUAD.len() as u32;

/// Fixed attribute layout: two tightly packed, unnormalised `f32` components.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    attributes: [wgpu::VertexAttribute; 1],
}

impl VertexLayout {
    pub const COMPONENTS: usize = 2;
    pub const STRIDE: wgpu::BufferAddress = (Self::COMPONENTS * std::mem::size_of::<f32>()) as u64;

    pub fn new(shader_location: u32) -> Self {
        Self {
            attributes: [wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location,
            }],
        }
    }

    pub fn shader_location(&self) -> u32 {
        self.attributes[0].shader_location
    }

    pub fn buffer_layout(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &self.attributes,
        }
    }
}

/// Vertex data uploaded once at startup and bound before every draw.
pub(crate) struct GeometryBuffer {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

impl GeometryBuffer {
    pub fn upload(device: &wgpu::Device, vertices: &[[f32; 2]]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fullscreen quad"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        tracing::debug!(vertices = vertices.len(), "uploaded geometry buffer");
        Self {
            buffer,
            vertex_count: vertices.len() as u32,
        }
    }

    pub fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_clip_space_with_two_triangles() {
        assert_eq!(QUAD_VERTEX_COUNT, 6);
        let bytes: &[u8] = bytemuck::cast_slice(&FULLSCREEN_QUAD);
        assert_eq!(bytes.len() as u64, VertexLayout::STRIDE * u64::from(QUAD_VERTEX_COUNT));
        for corner in [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]] {
            assert!(FULLSCREEN_QUAD.contains(&corner));
        }
    }

    #[test]
    fn layout_is_tightly_packed_vec2() {
        let layout = VertexLayout::new(3);
        let buffer = layout.buffer_layout();
        assert_eq!(buffer.array_stride, 8);
        assert_eq!(buffer.attributes.len(), 1);
        assert_eq!(buffer.attributes[0].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(buffer.attributes[0].offset, 0);
        assert_eq!(layout.shader_location(), 3);
    }
}
