//! Shader stage compilation and program linking.
//!
//! Stages are GLSL 4.50 parsed by naga's GLSL frontend and validated before
//! anything touches the GPU, so diagnostics carry source snippets and are
//! available without a device. Failures never abort startup: [`ProgramBuilder::build`]
//! logs each diagnostic and hands back whatever it managed to produce.

use std::fmt;

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::types::ShaderSources;
use crate::uniforms::{UniformChannel, UniformIssue, UniformLayout, UniformPolicy, FRAME_UNIFORMS};

/// Entry point name every stage must define.
pub const ENTRY_POINT: &str = "main";

/// Vertex input carrying the quad corners.
pub const POSITION_ATTRIBUTE: &str = "position";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderDiagnostic {
    #[error("{stage} stage failed to compile:\n{log}")]
    Compile { stage: StageKind, log: String },
    #[error("program failed to link: {log}")]
    Link { log: String },
    #[error("program does not match the frame inputs: {}", join_issues(.issues))]
    Uniforms { issues: Vec<UniformIssue> },
}

fn join_issues(issues: &[UniformIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One validated stage.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    kind: StageKind,
    module: naga::Module,
}

impl CompiledStage {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn module(&self) -> &naga::Module {
        &self.module
    }

    fn entry_point(&self) -> Option<&naga::EntryPoint> {
        self.module
            .entry_points
            .iter()
            .find(|entry| entry.name == ENTRY_POINT && entry.stage == self.kind.naga_stage())
    }
}

/// A vertex and fragment stage whose interfaces agree.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    vertex: CompiledStage,
    fragment: CompiledStage,
    uniform_layout: Option<UniformLayout>,
    position_location: Option<u32>,
}

impl ShaderProgram {
    pub fn vertex(&self) -> &CompiledStage {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledStage {
        &self.fragment
    }

    pub fn uniform_layout(&self) -> Option<&UniformLayout> {
        self.uniform_layout.as_ref()
    }

    /// Shader location of the `position` vertex input, if declared.
    pub fn position_location(&self) -> Option<u32> {
        self.position_location
    }
}

/// Result of a fail-soft build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub program: Option<ShaderProgram>,
    pub uniforms: UniformChannel,
    pub diagnostics: Vec<ShaderDiagnostic>,
    pub uniform_issues: Vec<UniformIssue>,
}

impl BuildReport {
    pub fn is_renderable(&self) -> bool {
        self.program.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgramBuilder {
    policy: UniformPolicy,
}

impl ProgramBuilder {
    pub fn new(policy: UniformPolicy) -> Self {
        Self { policy }
    }

    pub fn compile(
        &self,
        kind: StageKind,
        source: &str,
    ) -> Result<CompiledStage, ShaderDiagnostic> {
        let mut frontend = glsl::Frontend::default();
        let module = frontend
            .parse(&glsl::Options::from(kind.naga_stage()), source)
            .map_err(|errors| ShaderDiagnostic::Compile {
                stage: kind,
                log: errors.emit_to_string(source),
            })?;

        Validator::new(ValidationFlags::all(), Capabilities::default())
            .validate(&module)
            .map_err(|error| ShaderDiagnostic::Compile {
                stage: kind,
                log: error.emit_to_string(source),
            })?;

        let stage = CompiledStage { kind, module };
        if stage.entry_point().is_none() {
            return Err(ShaderDiagnostic::Compile {
                stage: kind,
                log: format!("no `{ENTRY_POINT}` entry point for the {kind} stage"),
            });
        }
        tracing::debug!(stage = %kind, "compiled shader stage");
        Ok(stage)
    }

    pub fn link(
        &self,
        vertex: &CompiledStage,
        fragment: &CompiledStage,
    ) -> Result<ShaderProgram, ShaderDiagnostic> {
        let link_error = |log: String| ShaderDiagnostic::Link { log };
        if vertex.kind != StageKind::Vertex || fragment.kind != StageKind::Fragment {
            return Err(link_error(format!(
                "expected vertex and fragment stages, got {} and {}",
                vertex.kind, fragment.kind
            )));
        }
        let vertex_entry = vertex
            .entry_point()
            .ok_or_else(|| link_error("vertex stage has no entry point".into()))?;
        let fragment_entry = fragment
            .entry_point()
            .ok_or_else(|| link_error("fragment stage has no entry point".into()))?;

        let outputs = stage_outputs(&vertex.module, vertex_entry);
        for (location, ty) in stage_inputs(&fragment.module, fragment_entry) {
            match outputs.iter().find(|(out, _)| *out == location) {
                None => {
                    return Err(link_error(format!(
                        "fragment input at location {location} is not written by the vertex stage"
                    )))
                }
                Some((_, out_ty)) if *out_ty != ty => {
                    return Err(link_error(format!(
                        "fragment input at location {location} differs from the vertex output type"
                    )))
                }
                Some(_) => {}
            }
        }

        let uniform_layout = UniformLayout::reflect(&fragment.module)
            .or_else(|| UniformLayout::reflect(&vertex.module));
        if let Some(layout) = &uniform_layout {
            if layout.group != 0 {
                return Err(link_error(format!(
                    "uniform block must be bound to set 0, found set {}",
                    layout.group
                )));
            }
        }

        let position_location =
            attribute_location(&vertex.module, vertex_entry, POSITION_ATTRIBUTE);
        tracing::debug!(
            uniform_block = uniform_layout.as_ref().map(|layout| layout.size),
            position_location,
            "linked shader program"
        );

        Ok(ShaderProgram {
            vertex: vertex.clone(),
            fragment: fragment.clone(),
            uniform_layout,
            position_location,
        })
    }

    /// Compiles, links, and resolves frame inputs, logging every diagnostic.
    ///
    /// A failing stage leaves the report without a program; callers keep
    /// running and draw nothing.
    pub fn build(&self, sources: &ShaderSources) -> BuildReport {
        let mut report = BuildReport::default();
        let vertex = self.record(&mut report, self.compile(StageKind::Vertex, &sources.vertex));
        let fragment = self.record(
            &mut report,
            self.compile(StageKind::Fragment, &sources.fragment),
        );
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return report;
        };
        let Some(program) = self.record(&mut report, self.link(&vertex, &fragment)) else {
            return report;
        };

        let (channel, issues) = UniformChannel::resolve(&program, &FRAME_UNIFORMS);
        if !issues.is_empty() {
            match self.policy {
                UniformPolicy::Lenient => {
                    tracing::warn!(
                        issues = %join_issues(&issues),
                        "frame inputs not fully bound; unresolved uniforms will not update"
                    );
                }
                UniformPolicy::Strict => {
                    let diagnostic = ShaderDiagnostic::Uniforms {
                        issues: issues.clone(),
                    };
                    tracing::error!("{diagnostic}");
                    report.diagnostics.push(diagnostic);
                    report.uniform_issues = issues;
                    return report;
                }
            }
        }
        report.uniforms = channel;
        report.uniform_issues = issues;
        report.program = Some(program);
        report
    }

    fn record<T>(
        &self,
        report: &mut BuildReport,
        result: Result<T, ShaderDiagnostic>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(diagnostic) => {
                tracing::error!("{diagnostic}");
                report.diagnostics.push(diagnostic);
                None
            }
        }
    }
}

fn location_of(binding: Option<&naga::Binding>) -> Option<u32> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

/// Location-bound values written by an entry point, flattening struct results.
fn stage_outputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<(u32, naga::TypeInner)> {
    let Some(result) = entry.function.result.as_ref() else {
        return Vec::new();
    };
    if let Some(location) = location_of(result.binding.as_ref()) {
        return vec![(location, module.types[result.ty].inner.clone())];
    }
    match &module.types[result.ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|member| {
                let location = location_of(member.binding.as_ref())?;
                Some((location, module.types[member.ty].inner.clone()))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Location-bound inputs read by an entry point, flattening struct arguments.
fn stage_inputs(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<(u32, naga::TypeInner)> {
    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        if let Some(location) = location_of(argument.binding.as_ref()) {
            inputs.push((location, module.types[argument.ty].inner.clone()));
        } else if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
            inputs.extend(members.iter().filter_map(|member| {
                let location = location_of(member.binding.as_ref())?;
                Some((location, module.types[member.ty].inner.clone()))
            }));
        }
    }
    inputs
}

/// Finds the named vertex input, falling back to the first location-bound one.
fn attribute_location(module: &naga::Module, entry: &naga::EntryPoint, name: &str) -> Option<u32> {
    let arguments = &entry.function.arguments;
    arguments
        .iter()
        .find(|argument| argument.name.as_deref() == Some(name))
        .and_then(|argument| location_of(argument.binding.as_ref()))
        .or_else(|| {
            stage_inputs(module, entry)
                .into_iter()
                .map(|(location, _)| location)
                .min()
        })
}
