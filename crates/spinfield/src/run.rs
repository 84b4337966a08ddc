use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::{
    BuildReport, Renderer, RendererConfig, ShaderSources, UniformPolicy, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER,
};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::config::{self, FileConfig};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the window and animates until it is closed.
pub fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    tracing::info!(
        width = config.window_size.0,
        height = config.window_size.1,
        pointer_device = ?config.pointer_device,
        uniform_policy = ?config.uniform_policy,
        "starting spinfield"
    );
    Renderer::new(config).run()
}

/// Builds the program headlessly and prints what the renderer would bind.
///
/// Returns whether the program would render.
pub fn check(args: RunArgs) -> Result<bool> {
    let config = resolve_config(&args)?;
    let report = Renderer::new(config).check();
    print!("{}", describe_report(&report));
    Ok(report.is_renderable())
}

/// Merges defaults, the config file, and command-line flags, in that order.
pub fn resolve_config(args: &RunArgs) -> Result<RendererConfig> {
    let file = config::discover(args.config.as_deref())
        .context("failed to load configuration file")?
        .map(|(_, file)| file)
        .unwrap_or_default();
    merge(args, file)
}

fn merge(args: &RunArgs, file: FileConfig) -> Result<RendererConfig> {
    let defaults = RendererConfig::default();

    let width = args
        .width
        .or(file.window.width)
        .unwrap_or(defaults.window_size.0);
    let height = args
        .height
        .or(file.window.height)
        .unwrap_or(defaults.window_size.1);
    let title = args
        .title
        .clone()
        .or(file.window.title)
        .unwrap_or(defaults.title);

    let vertex_path = args.vertex.clone().or(file.shader.vertex);
    let fragment_path = args.fragment.clone().or(file.shader.fragment);
    let shaders = ShaderSources::new(
        load_stage(vertex_path.as_deref(), DEFAULT_VERTEX_SHADER)?,
        load_stage(fragment_path.as_deref(), DEFAULT_FRAGMENT_SHADER)?,
    );

    let strict = args.strict_uniforms || file.render.strict_uniforms.unwrap_or(false);
    let uniform_policy = if strict {
        UniformPolicy::Strict
    } else {
        UniformPolicy::Lenient
    };

    Ok(RendererConfig {
        window_size: (width, height),
        title,
        shaders,
        pointer_device: args
            .pointer_device
            .or(file.input.pointer_device)
            .unwrap_or(defaults.pointer_device),
        uniform_policy,
        antialiasing: args
            .antialias
            .or(file.render.antialias)
            .unwrap_or(defaults.antialiasing),
        color_space: args
            .color_space
            .or(file.render.color_space)
            .unwrap_or(defaults.color_space),
    })
}

fn load_stage(path: Option<&Path>, bundled: &'static str) -> Result<Cow<'static, str>> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read shader at {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded shader stage");
            Ok(text.into())
        }
        None => Ok(bundled.into()),
    }
}

pub fn describe_report(report: &BuildReport) -> String {
    let mut out = String::new();
    match report.program.as_ref() {
        Some(program) => {
            out.push_str("program: linked\n");
            if let Some(location) = program.position_location() {
                out.push_str(&format!("  attribute position @ location {location}\n"));
            }
            if let Some(layout) = program.uniform_layout() {
                out.push_str(&format!(
                    "  uniform block: group {} binding {} ({} bytes)\n",
                    layout.group, layout.binding, layout.size
                ));
            }
        }
        None => out.push_str("program: unavailable (frames will only be cleared)\n"),
    }

    let mut locations: Vec<_> = report.uniforms.locations().iter().collect();
    locations.sort_by_key(|(_, location)| location.offset);
    if locations.is_empty() {
        out.push_str("uniforms: none bound\n");
    } else {
        out.push_str("uniforms:\n");
        for (name, location) in locations {
            out.push_str(&format!(
                "  {name:<12} offset {:>4}  {}\n",
                location.offset, location.ty
            ));
        }
    }

    for issue in &report.uniform_issues {
        out.push_str(&format!("warning: {issue}\n"));
    }
    for diagnostic in &report.diagnostics {
        out.push_str(&format!("error: {diagnostic}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::{Antialiasing, ColorSpaceMode, PointerDevice};
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_flags_or_file() {
        let config = merge(&RunArgs::default(), FileConfig::default()).unwrap();
        assert_eq!(config.window_size, (1280.0, 720.0));
        assert_eq!(config.title, "spinfield");
        assert_eq!(config.shaders, ShaderSources::default());
        assert_eq!(config.uniform_policy, UniformPolicy::Lenient);
        assert_eq!(config.pointer_device, PointerDevice::Auto);
        assert_eq!(config.antialiasing, Antialiasing::Off);
    }

    #[test]
    fn flags_override_file_values() {
        let file = FileConfig::from_toml_str(concat!(
            "[window]\nwidth = 300\nheight = 200\n",
            "[render]\ncolor_space = \"linear\"\nantialias = \"auto\"\n",
        ))
        .unwrap();
        let args = RunArgs {
            width: Some(640.0),
            antialias: Some(Antialiasing::Off),
            strict_uniforms: true,
            ..RunArgs::default()
        };
        let config = merge(&args, file).unwrap();
        assert_eq!(config.window_size, (640.0, 200.0));
        assert_eq!(config.antialiasing, Antialiasing::Off);
        assert_eq!(config.color_space, ColorSpaceMode::Linear);
        assert_eq!(config.uniform_policy, UniformPolicy::Strict);
    }

    #[test]
    fn shader_paths_are_read_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flat.frag");
        fs::write(&path, "#version 450\nvoid main() {}\n").unwrap();
        let args = RunArgs {
            fragment: Some(path),
            ..RunArgs::default()
        };
        let config = merge(&args, FileConfig::default()).unwrap();
        assert_eq!(config.shaders.fragment, "#version 450\nvoid main() {}\n");
        assert_eq!(config.shaders.vertex, DEFAULT_VERTEX_SHADER);

        let missing = RunArgs {
            vertex: Some(dir.path().join("missing.vert")),
            ..RunArgs::default()
        };
        assert!(merge(&missing, FileConfig::default()).is_err());
    }

    #[test]
    fn report_lists_bundled_uniforms_in_block_order() {
        let report = Renderer::new(RendererConfig::default()).check();
        let text = describe_report(&report);
        assert!(text.starts_with("program: linked\n"), "{text}");
        let time = text.find("time").unwrap();
        let resolution = text.find("resolution").unwrap();
        let pointers = text.find("pointers").unwrap();
        assert!(time < resolution && resolution < pointers, "{text}");
        assert!(text.contains("vec2[10]"), "{text}");
        assert!(!text.contains("error:"), "{text}");
    }
}
