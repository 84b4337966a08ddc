//! Optional TOML configuration file.
//!
//! Values here sit between the built-in defaults and the command line:
//! anything passed as a flag wins over the file.

use std::fs;
use std::path::{Path, PathBuf};

use directories_next::ProjectDirs;
use renderer::{Antialiasing, ColorSpaceMode, PointerDevice};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::cli::{parse_antialias, parse_color_space, parse_pointer_device};

pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "spinfield";
const APPLICATION: &str = "spinfield";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub shader: ShaderSection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShaderSection {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSection {
    #[serde(default, deserialize_with = "deserialize_pointer_device_opt")]
    pub pointer_device: Option<PointerDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<Antialiasing>,
    #[serde(default, deserialize_with = "deserialize_color_space_opt")]
    pub color_space: Option<ColorSpaceMode>,
    pub strict_uniforms: Option<bool>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FileConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Relative shader paths resolve against the directory holding the file.
    pub fn rebase(mut self, base: &Path) -> Self {
        for path in [&mut self.shader.vertex, &mut self.shader.fragment]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("width", self.window.width), ("height", self.window.height)] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "window.{name} must be greater than zero (got {value})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Platform default location, e.g. `~/.config/spinfield/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Loads the explicit file if one was named, else the platform default when present.
///
/// An explicitly named file that cannot be read is an error; a missing default
/// file just means no configuration.
pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, FileConfig)>, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(None),
        },
    };
    if !required && !path.is_file() {
        tracing::debug!(path = %path.display(), "no configuration file found");
        return Ok(None);
    }
    let config = FileConfig::load(&path)?;
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    tracing::debug!(path = %path.display(), "loaded configuration file");
    Ok(Some((path, config.rebase(&base))))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Num(i64),
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<Antialiasing>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper: Option<StrOrNum> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(StrOrNum::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(StrOrNum::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn deserialize_color_space_opt<'de, D>(deserializer: D) -> Result<Option<ColorSpaceMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_color_space(&value).map_err(de::Error::custom))
        .transpose()
}

fn deserialize_pointer_device_opt<'de, D>(
    deserializer: D,
) -> Result<Option<PointerDevice>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| parse_pointer_device(&value).map_err(de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[window]
width = 800
height = 600.5
title = "circles"

[shader]
fragment = "shaders/custom.frag"

[input]
pointer_device = "coarse"

[render]
antialias = 4
color_space = "linear"
strict_uniforms = true
"#;

    #[test]
    fn parses_every_section() {
        let config = FileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.window.width, Some(800.0));
        assert_eq!(config.window.height, Some(600.5));
        assert_eq!(config.window.title.as_deref(), Some("circles"));
        assert_eq!(config.shader.vertex, None);
        assert_eq!(config.shader.fragment, Some(PathBuf::from("shaders/custom.frag")));
        assert_eq!(config.input.pointer_device, Some(PointerDevice::Coarse));
        assert_eq!(config.render.antialias, Some(Antialiasing::Samples(4)));
        assert_eq!(config.render.color_space, Some(ColorSpaceMode::Linear));
        assert_eq!(config.render.strict_uniforms, Some(true));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(FileConfig::from_toml_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::from_toml_str("[window]\nfullscreen = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
        let err = FileConfig::from_toml_str("[audio]\nvolume = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            FileConfig::from_toml_str("[window]\nwidth = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(FileConfig::from_toml_str("[render]\nantialias = 3\n").is_err());
        assert!(FileConfig::from_toml_str("[render]\nantialias = -2\n").is_err());
        assert!(FileConfig::from_toml_str("[input]\npointer_device = \"pen\"\n").is_err());
    }

    #[test]
    fn relative_shader_paths_follow_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spinfield.toml");
        fs::write(
            &path,
            "[shader]\nvertex = \"/abs/quad.vert\"\nfragment = \"rel.frag\"\n",
        )
        .unwrap();

        let (found, config) = discover(Some(&path)).unwrap().unwrap();
        assert_eq!(found, path);
        assert_eq!(config.shader.vertex, Some(PathBuf::from("/abs/quad.vert")));
        assert_eq!(config.shader.fragment, Some(dir.path().join("rel.frag")));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = discover(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
