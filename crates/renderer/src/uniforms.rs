//! Named per-frame shader inputs.
//!
//! After linking, the program's uniform block is reflected into a
//! [`UniformLayout`]; each member becomes a [`UniformLocation`] holding its byte
//! offset and type. Values are pushed into a CPU-side [`UniformBlock`] image
//! that the GPU backend uploads once per frame. Pushing to a location that did
//! not resolve is a no-op.

use std::collections::HashMap;
use std::fmt;

use wgpu::naga;

use crate::pointer::POINTER_CAPACITY;
use crate::program::ShaderProgram;

/// Reflected type of a uniform block member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Vec2,
    Vec2Array { len: u32, stride: u32 },
    Other,
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformType::Float => f.write_str("float"),
            UniformType::Vec2 => f.write_str("vec2"),
            UniformType::Vec2Array { len, .. } => write!(f, "vec2[{len}]"),
            UniformType::Other => f.write_str("unsupported type"),
        }
    }
}

/// Type a frame input is expected to have in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec2Array,
}

impl UniformKind {
    fn accepts(self, ty: UniformType) -> bool {
        matches!(
            (self, ty),
            (UniformKind::Float, UniformType::Float)
                | (UniformKind::Vec2, UniformType::Vec2)
                | (UniformKind::Vec2Array, UniformType::Vec2Array { .. })
        )
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformKind::Float => f.write_str("float"),
            UniformKind::Vec2 => f.write_str("vec2"),
            UniformKind::Vec2Array => f.write_str("vec2[]"),
        }
    }
}

/// A frame input the renderer drives, by name and expected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSpec {
    pub name: &'static str,
    pub kind: UniformKind,
}

pub const TIME: UniformSpec = UniformSpec {
    name: "time",
    kind: UniformKind::Float,
};

pub const RESOLUTION: UniformSpec = UniformSpec {
    name: "resolution",
    kind: UniformKind::Vec2,
};

pub const POINTERS: UniformSpec = UniformSpec {
    name: "pointers",
    kind: UniformKind::Vec2Array,
};

/// Every input pushed each frame.
pub const FRAME_UNIFORMS: [UniformSpec; 3] = [TIME, RESOLUTION, POINTERS];

/// How startup uniform mismatches are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UniformPolicy {
    /// Warn once and leave unresolved inputs unbound.
    #[default]
    Lenient,
    /// Refuse to render with a program that does not match the frame inputs.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformIssue {
    #[error("uniform `{name}` is not declared by the program")]
    Missing { name: &'static str },
    #[error("uniform `{name}` is declared as {found}, expected {expected}")]
    TypeMismatch {
        name: &'static str,
        expected: UniformKind,
        found: UniformType,
    },
}

/// One named field of the uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    /// Byte offset from the start of the block, std140 rules.
    pub offset: u32,
    pub ty: UniformType,
}

/// Reflection of a program's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    /// Descriptor set (`set = N` in GLSL).
    pub group: u32,
    pub binding: u32,
    /// Total block size in bytes, including trailing padding.
    pub size: u32,
    /// Fields in declaration order.
    pub members: Vec<UniformMember>,
}

impl UniformLayout {
    /// Finds the first uniform block declared by `module`.
    pub fn reflect(module: &naga::Module) -> Option<Self> {
        module.global_variables.iter().find_map(|(_, global)| {
            if global.space != naga::AddressSpace::Uniform {
                return None;
            }
            let naga::TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
                return None;
            };
            let (group, binding) = global
                .binding
                .as_ref()
                .map(|rb| (rb.group, rb.binding))
                .unwrap_or((0, 0));
            let members = members
                .iter()
                .filter_map(|member| {
                    Some(UniformMember {
                        name: member.name.clone()?,
                        offset: member.offset,
                        ty: reflect_type(module, member.ty),
                    })
                })
                .collect();
            Some(Self {
                group,
                binding,
                size: *span,
                members,
            })
        })
    }

    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|member| member.name == name)
    }
}

fn reflect_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> UniformType {
    let is_f32 =
        |scalar: &naga::Scalar| scalar.kind == naga::ScalarKind::Float && scalar.width == 4;
    match &module.types[ty].inner {
        naga::TypeInner::Scalar(scalar) if is_f32(scalar) => UniformType::Float,
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar,
        } if is_f32(scalar) => UniformType::Vec2,
        naga::TypeInner::Array {
            base,
            size: naga::ArraySize::Constant(len),
            stride,
        } if reflect_type(module, *base) == UniformType::Vec2 => UniformType::Vec2Array {
            len: len.get(),
            stride: *stride,
        },
        _ => UniformType::Other,
    }
}

/// Resolved handle for one uniform: where it lives in the block image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub offset: u32,
    pub ty: UniformType,
}

/// Name to location mapping produced once after linking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLocations {
    entries: HashMap<&'static str, UniformLocation>,
}

impl UniformLocations {
    pub fn get(&self, name: &str) -> Option<&UniformLocation> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &UniformLocation)> {
        self.entries.iter().map(|(name, location)| (*name, location))
    }
}

/// Resolves `specs` against a reflected layout.
///
/// Names that are missing or have the wrong type are reported and left out of
/// the mapping.
pub fn resolve_locations(
    layout: Option<&UniformLayout>,
    specs: &[UniformSpec],
) -> (UniformLocations, Vec<UniformIssue>) {
    let mut locations = UniformLocations::default();
    let mut issues = Vec::new();
    for spec in specs {
        match layout.and_then(|layout| layout.member(spec.name)) {
            None => issues.push(UniformIssue::Missing { name: spec.name }),
            Some(member) if !spec.kind.accepts(member.ty) => {
                issues.push(UniformIssue::TypeMismatch {
                    name: spec.name,
                    expected: spec.kind,
                    found: member.ty,
                })
            }
            Some(member) => {
                locations.entries.insert(
                    spec.name,
                    UniformLocation {
                        offset: member.offset,
                        ty: member.ty,
                    },
                );
            }
        }
    }
    (locations, issues)
}

/// A value for one uniform push.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Vec2([f32; 2]),
    Vec2Array(&'a [[f32; 2]]),
}

/// CPU-side image of the uniform block, uploaded verbatim each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniformBlock {
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes `value` at `location`; a missing location or mismatched value
    /// kind leaves the block untouched.
    ///
    /// Arrays are truncated to the declared length and every slot past the
    /// supplied values is zeroed.
    pub fn push(&mut self, location: Option<&UniformLocation>, value: UniformValue<'_>) {
        let Some(location) = location else {
            return;
        };
        let offset = location.offset as usize;
        match (location.ty, value) {
            (UniformType::Float, UniformValue::Float(v)) => {
                self.write(offset, bytemuck::bytes_of(&v))
            }
            (UniformType::Vec2, UniformValue::Vec2(v)) => {
                self.write(offset, bytemuck::cast_slice(&v))
            }
            (UniformType::Vec2Array { len, stride }, UniformValue::Vec2Array(values)) => {
                for index in 0..len as usize {
                    let slot = values.get(index).copied().unwrap_or([0.0; 2]);
                    self.write(offset + index * stride as usize, bytemuck::cast_slice(&slot));
                }
            }
            (ty, value) => {
                tracing::trace!(?ty, ?value, "ignoring uniform push with mismatched kind");
            }
        }
    }

    pub fn read_float(&self, location: &UniformLocation) -> Option<f32> {
        self.read(location.offset as usize)
    }

    pub fn read_vec2(&self, location: &UniformLocation, index: usize) -> Option<[f32; 2]> {
        let offset = match location.ty {
            UniformType::Vec2 if index == 0 => location.offset as usize,
            UniformType::Vec2Array { len, stride } if index < len as usize => {
                location.offset as usize + index * stride as usize
            }
            _ => return None,
        };
        Some([self.read(offset)?, self.read(offset + 4)?])
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        match self.bytes.get_mut(offset..offset + data.len()) {
            Some(target) => target.copy_from_slice(data),
            None => tracing::warn!(offset, len = data.len(), "uniform write outside block"),
        }
    }

    fn read(&self, offset: usize) -> Option<f32> {
        self.bytes
            .get(offset..offset + 4)
            .map(bytemuck::pod_read_unaligned::<f32>)
    }
}

/// Inputs recomputed for every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSet<'a> {
    pub time: f32,
    pub resolution: [f32; 2],
    pub pointers: &'a [[f32; 2]],
}

/// Resolved locations plus the block image they write into.
#[derive(Debug, Clone, Default)]
pub struct UniformChannel {
    locations: UniformLocations,
    block: UniformBlock,
}

impl UniformChannel {
    /// Resolves the frame inputs against a linked program.
    pub fn resolve(program: &ShaderProgram, specs: &[UniformSpec]) -> (Self, Vec<UniformIssue>) {
        let layout = program.uniform_layout();
        let (locations, issues) = resolve_locations(layout, specs);
        let size = layout.map(|layout| layout.size as usize).unwrap_or(0);
        let channel = Self {
            locations,
            block: UniformBlock::new(size),
        };
        (channel, issues)
    }

    /// A channel with nothing bound, used when no program is available.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn locations(&self) -> &UniformLocations {
        &self.locations
    }

    pub fn block(&self) -> &UniformBlock {
        &self.block
    }

    pub fn push(&mut self, name: &str, value: UniformValue<'_>) {
        self.block.push(self.locations.get(name), value);
    }

    pub fn push_frame(&mut self, set: &UniformSet<'_>) {
        self.push(TIME.name, UniformValue::Float(set.time));
        self.push(RESOLUTION.name, UniformValue::Vec2(set.resolution));
        let pointers = &set.pointers[..set.pointers.len().min(POINTER_CAPACITY)];
        self.push(POINTERS.name, UniformValue::Vec2Array(pointers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UniformLayout {
        UniformLayout {
            group: 0,
            binding: 0,
            size: 64,
            members: vec![
                UniformMember {
                    name: "time".into(),
                    offset: 0,
                    ty: UniformType::Float,
                },
                UniformMember {
                    name: "resolution".into(),
                    offset: 8,
                    ty: UniformType::Vec2,
                },
                UniformMember {
                    name: "pointers".into(),
                    offset: 16,
                    ty: UniformType::Vec2Array { len: 3, stride: 16 },
                },
            ],
        }
    }

    #[test]
    fn resolves_all_frame_inputs() {
        let layout = layout();
        let (locations, issues) = resolve_locations(Some(&layout), &FRAME_UNIFORMS);
        assert!(issues.is_empty());
        assert_eq!(locations.len(), 3);
        assert_eq!(locations.get("resolution").map(|l| l.offset), Some(8));
    }

    #[test]
    fn missing_and_mistyped_uniforms_are_reported() {
        let mut layout = layout();
        layout.members.retain(|member| member.name != "pointers");
        layout.members[0].ty = UniformType::Vec2;
        let (locations, issues) = resolve_locations(Some(&layout), &FRAME_UNIFORMS);
        assert_eq!(locations.len(), 1);
        assert!(issues.contains(&UniformIssue::Missing { name: "pointers" }));
        assert!(issues.contains(&UniformIssue::TypeMismatch {
            name: "time",
            expected: UniformKind::Float,
            found: UniformType::Vec2,
        }));

        let (none, issues) = resolve_locations(None, &FRAME_UNIFORMS);
        assert!(none.is_empty());
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn pointer_array_is_padded_and_truncated() {
        let layout = layout();
        let (locations, _) = resolve_locations(Some(&layout), &FRAME_UNIFORMS);
        let pointers = *locations.get("pointers").unwrap();
        let mut block = UniformBlock::new(layout.size as usize);

        let values = [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
        block.push(Some(&pointers), UniformValue::Vec2Array(&values));
        assert_eq!(block.read_vec2(&pointers, 2), Some([5.0, 6.0]));
        assert_eq!(block.read_vec2(&pointers, 3), None);

        block.push(Some(&pointers), UniformValue::Vec2Array(&[[9.0, 9.0]]));
        assert_eq!(block.read_vec2(&pointers, 0), Some([9.0, 9.0]));
        assert_eq!(block.read_vec2(&pointers, 1), Some([0.0, 0.0]));
        assert_eq!(block.read_vec2(&pointers, 2), Some([0.0, 0.0]));
    }

    #[test]
    fn unresolved_or_mismatched_pushes_are_no_ops() {
        let layout = layout();
        let (locations, _) = resolve_locations(Some(&layout), &FRAME_UNIFORMS);
        let mut block = UniformBlock::new(layout.size as usize);
        block.push(None, UniformValue::Float(3.0));
        block.push(locations.get("time"), UniformValue::Vec2([1.0, 1.0]));
        assert!(block.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn writes_past_the_block_are_dropped() {
        let location = UniformLocation {
            offset: 4,
            ty: UniformType::Vec2,
        };
        let mut block = UniformBlock::new(8);
        block.push(Some(&location), UniformValue::Vec2([1.0, 1.0]));
        assert!(block.as_bytes().iter().all(|byte| *byte == 0));
    }
}
