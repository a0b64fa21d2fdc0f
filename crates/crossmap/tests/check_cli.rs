use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

const FACE_NAMES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

fn write_faces(dir: &Path, edge: u32) {
    fs::create_dir_all(dir).unwrap();
    for (index, name) in FACE_NAMES.iter().enumerate() {
        let shade = 40 * index as u8;
        RgbaImage::from_pixel(edge, edge, Rgba([shade, 255 - shade, 128, 255]))
            .save(dir.join(format!("{name}.png")))
            .unwrap();
    }
}

fn crossmap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crossmap"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run crossmap")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is utf-8")
}

#[test]
fn check_accepts_face_directory() {
    let root = TempDir::new().unwrap();
    let faces = root.path().join("faces");
    write_faces(&faces, 8);

    for variant in ["compute", "raster", "skybox"] {
        let output = crossmap(&["check", "--assets", path_arg(&faces), "--variant", variant]);
        assert!(
            output.status.success(),
            "variant {variant} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("8x8"), "unexpected output: {stdout}");
        assert!(stdout.trim_end().ends_with("ok"));
    }
}

#[test]
fn check_fails_when_a_face_is_missing() {
    let root = TempDir::new().unwrap();
    let faces = root.path().join("faces");
    write_faces(&faces, 4);
    fs::remove_file(faces.join("ny.png")).unwrap();

    let output = crossmap(&["check", "--assets", path_arg(&faces), "--extension", "png"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ny.png"), "unexpected error: {stderr}");
}

#[test]
fn check_reads_scene_with_relative_strip() {
    let root = TempDir::new().unwrap();
    let edge = 4;
    let mut strip = RgbaImage::new(edge, edge * 6);
    for (index, pixel) in strip.pixels_mut().enumerate() {
        let face = index as u32 / (edge * edge);
        *pixel = Rgba([face as u8 * 40, 0, 0, 255]);
    }
    strip.save(root.path().join("cube.png")).unwrap();

    let scene = root.path().join("scene.toml");
    fs::write(
        &scene,
        r#"
version = 1
variant = "raster-with-cube-sample"

[cubemap]
strip = "cube.png"
"#,
    )
    .unwrap();

    let output = crossmap(&["check", "--scene", path_arg(&scene)]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("raster-with-cube-sample"));
    assert!(stdout.contains("4x4"));
}

#[test]
fn check_reports_broken_override_shader() {
    let root = TempDir::new().unwrap();
    let faces = root.path().join("faces");
    let shaders = root.path().join("shaders");
    write_faces(&faces, 4);
    fs::create_dir_all(&shaders).unwrap();
    fs::write(
        shaders.join("skybox.frag"),
        "#version 450\nlayout(location = 0) out vec4 colour;\nvoid main() { colour = missing; }\n",
    )
    .unwrap();

    let output = crossmap(&[
        "check",
        "--assets",
        path_arg(&faces),
        "--shaders",
        path_arg(&shaders),
        "--variant",
        "skybox",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("skybox.frag"), "unexpected error: {stderr}");
}

#[test]
fn help_lists_subcommands() {
    let output = crossmap(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("check"));
}
