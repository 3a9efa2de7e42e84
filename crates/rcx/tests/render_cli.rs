use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn rcx(config_dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_rcx"));
    command.env("RCX_CONFIG_DIR", config_dir).env_remove("RCX_CONFIG");
    command
}

fn luminance(image: &image::RgbaImage, x: u32, y: u32) -> u32 {
    let [r, g, b, _] = image.get_pixel(x, y).0;
    u32::from(r) + u32::from(g) + u32::from(b)
}

#[test]
fn cpu_render_writes_lit_disk() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("frame.png");

    let status = rcx(root.path())
        .args([
            "render",
            "--backend",
            "cpu",
            "--size",
            "48x32",
            "--stage",
            "pathtracing",
            "--rays",
            "8",
            "--disk",
            "4",
            "--output",
        ])
        .arg(&output)
        .status()
        .expect("failed to run rcx render");
    assert!(status.success());

    let frame = image::open(&output).unwrap().to_rgba8();
    assert_eq!(frame.dimensions(), (48, 32));
    assert!(luminance(&frame, 24, 16) > 0);
    assert!(luminance(&frame, 24, 16) > luminance(&frame, 2, 2));
}

#[test]
fn settings_file_is_picked_up() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("settings.toml"),
        "[engine]\nwidth = 20\nheight = 10\nstage = \"painting\"\n",
    )
    .unwrap();
    let output = root.path().join("painting.png");

    let status = rcx(root.path())
        .args(["render", "--backend", "cpu", "--disk", "3", "-o"])
        .arg(&output)
        .status()
        .expect("failed to run rcx render");
    assert!(status.success());

    let frame = image::open(&output).unwrap().to_rgba8();
    assert_eq!(frame.dimensions(), (20, 10));
    assert_eq!(frame.get_pixel(10, 5).0, [255, 255, 255, 255]);
    assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 0]);
}

#[test]
fn mismatched_scene_is_rejected() {
    let root = TempDir::new().unwrap();
    let scene = root.path().join("scene.png");
    image::RgbaImage::new(8, 8).save(&scene).unwrap();

    let output = rcx(root.path())
        .args(["render", "--backend", "cpu", "--size", "16x16", "--scene"])
        .arg(&scene)
        .args(["--output"])
        .arg(root.path().join("out.png"))
        .output()
        .expect("failed to run rcx render");
    assert!(!output.status.success());
    assert!(!root.path().join("out.png").exists());
}

#[test]
fn broken_settings_file_fails_fast() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("settings.toml"), "[engine]\nstage = 9\n").unwrap();

    let output = rcx(root.path())
        .args(["render", "--backend", "cpu", "-o"])
        .arg(root.path().join("out.png"))
        .output()
        .expect("failed to run rcx render");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("settings"), "unexpected stderr: {stderr}");
}
