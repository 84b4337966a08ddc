use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const PARTIAL_FRAGMENT: &str = r#"#version 450
layout(location = 0) out vec4 fragColor;
layout(std140, set = 0, binding = 0) uniform FrameInputs {
    float time;
    vec2 resolution;
};
void main() {
    vec2 uv = gl_FragCoord.xy / resolution;
    fragColor = vec4(uv, 0.5 + 0.5 * sin(time), 1.0);
}
"#;

const BROKEN_FRAGMENT: &str = "#version 450\nvoid main() { undefined_call(); }\n";

/// Runs `spinfield` with the user config directory pointed into `home`.
fn spinfield(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spinfield"))
        .env_remove("SPINFIELD_CONFIG")
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("failed to run spinfield")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn check_reports_bundled_program() {
    let home = TempDir::new().unwrap();
    let output = spinfield(home.path(), &["check"]);
    let text = stdout(&output);

    assert!(output.status.success(), "{text}");
    assert!(text.contains("program: linked"), "{text}");
    for name in ["time", "resolution", "pointers"] {
        assert!(text.contains(name), "missing {name}: {text}");
    }
    assert!(!text.contains("error:"), "{text}");
}

#[test]
fn check_fails_for_a_stage_that_does_not_compile() {
    let home = TempDir::new().unwrap();
    let shader = home.path().join("broken.frag");
    fs::write(&shader, BROKEN_FRAGMENT).unwrap();

    let output = spinfield(home.path(), &["check", "--fragment", shader.to_str().unwrap()]);
    let text = stdout(&output);

    assert!(!output.status.success(), "{text}");
    assert!(text.contains("program: unavailable"), "{text}");
    assert!(text.contains("error: fragment stage failed to compile"), "{text}");
}

#[test]
fn missing_uniforms_warn_unless_strict() {
    let home = TempDir::new().unwrap();
    let shader = home.path().join("partial.frag");
    fs::write(&shader, PARTIAL_FRAGMENT).unwrap();
    let shader = shader.to_str().unwrap();

    let lenient = spinfield(home.path(), &["check", "--fragment", shader]);
    let text = stdout(&lenient);
    assert!(lenient.status.success(), "{text}");
    assert!(text.contains("warning: uniform `pointers`"), "{text}");

    let strict = spinfield(home.path(), &["check", "--fragment", shader, "--strict-uniforms"]);
    let text = stdout(&strict);
    assert!(!strict.status.success(), "{text}");
    assert!(text.contains("program: unavailable"), "{text}");
}

#[test]
fn config_file_from_env_supplies_shader_paths() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("project");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("partial.frag"), PARTIAL_FRAGMENT).unwrap();
    let config_path = config_dir.join("spinfield.toml");
    fs::write(
        &config_path,
        "[shader]\nfragment = \"partial.frag\"\n\n[render]\nstrict_uniforms = true\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_spinfield"))
        .env("SPINFIELD_CONFIG", &config_path)
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("RUST_LOG", "off")
        .arg("check")
        .output()
        .expect("failed to run spinfield");
    let text = stdout(&output);
    assert!(!output.status.success(), "{text}");
    assert!(text.contains("uniform `pointers` is not declared"), "{text}");
}

#[cfg(target_os = "linux")]
#[test]
fn default_config_location_is_honoured_and_validated() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("config/spinfield");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[window]\nfullscreen = true\n").unwrap();

    let output = spinfield(home.path(), &["check"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration file"), "{stderr}");
}
