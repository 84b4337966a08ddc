use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{Antialiasing, ColorSpaceMode, PointerDevice};

#[derive(Parser, Debug)]
#[command(
    name = "spinfield",
    author,
    version,
    about = "Animated field of rotating, tiled circles rendered with wgpu",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options shared by the window and `check`.
///
/// Every field is optional so the config file can fill whatever the command
/// line leaves out.
#[derive(Parser, Debug, Default, Clone)]
pub struct RunArgs {
    /// Logical window width.
    #[arg(long, value_name = "PIXELS", value_parser = parse_extent)]
    pub width: Option<f64>,

    /// Logical window height.
    #[arg(long, value_name = "PIXELS", value_parser = parse_extent)]
    pub height: Option<f64>,

    /// Window title.
    #[arg(long)]
    pub title: Option<String>,

    /// GLSL vertex stage replacing the bundled one.
    #[arg(long, value_name = "PATH")]
    pub vertex: Option<PathBuf>,

    /// GLSL fragment stage replacing the bundled one.
    #[arg(long, value_name = "PATH")]
    pub fragment: Option<PathBuf>,

    /// Pointer device class: `auto`, `fine` (cursor feeds the pointers), or `coarse` (touch only).
    #[arg(long, value_name = "CLASS", value_parser = parse_pointer_device)]
    pub pointer_device: Option<PointerDevice>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    ///
    /// MSAA only smooths primitive edges. The bundled quad covers the whole
    /// window, so this only shows with a vertex stage that moves the quad.
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,

    /// Refuse to draw when the program lacks any frame input.
    #[arg(long)]
    pub strict_uniforms: bool,

    /// Configuration file; can also be supplied via the `SPINFIELD_CONFIG` env var.
    #[arg(long, value_name = "FILE", env = "SPINFIELD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile and link the configured shaders without opening a window.
    Check(CheckCommand),
}

#[derive(Parser, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    pub run: RunArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_extent(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    let extent: f64 = trimmed
        .parse()
        .map_err(|_| format!("invalid size '{trimmed}'; expected a number of pixels"))?;
    if !extent.is_finite() || extent <= 0.0 {
        return Err(format!("size must be greater than zero (got {trimmed})"));
    }
    Ok(extent)
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(Antialiasing::Auto),
        "off" | "none" | "disable" | "disabled" | "0" => Ok(Antialiasing::Off),
        _ => {
            let samples: u32 = normalized.parse().map_err(|_| {
                format!("invalid anti-alias sample count '{trimmed}'; use auto/off or 2/4/8/16")
            })?;

            if samples == 0 || samples == 1 {
                return Ok(Antialiasing::Off);
            }

            if !matches!(samples, 2 | 4 | 8 | 16) {
                return Err(format!(
                    "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
                ));
            }

            Ok(Antialiasing::Samples(samples))
        }
    }
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" | "canvas" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}

pub fn parse_pointer_device(value: &str) -> Result<PointerDevice, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("pointer device must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" => Ok(PointerDevice::Auto),
        "fine" | "mouse" => Ok(PointerDevice::Fine),
        "coarse" | "touch" => Ok(PointerDevice::Coarse),
        other => Err(format!(
            "unknown pointer device '{other}'; expected auto, fine, or coarse"
        )),
    }
}
