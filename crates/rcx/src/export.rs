//! `rcx render`: one frame without a window, written as PNG.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::{GenericImageView, ImageFormat, RgbaImage};
use radiance::{CpuEngine, Engine, Frame, PipelineParams, RenderBackend, Resolution};
use settings::EngineSettings;
use tracing::{info, warn};

use crate::cli::{Backend, RenderArgs};
use crate::paint::Canvas;

const WHITE: [u8; 4] = [255, 255, 255, 255];

enum Scene {
    Single(Vec<u8>),
    Layers { color: Vec<u8>, emissive: Vec<u8> },
}

pub fn run_render(args: RenderArgs, engine: &EngineSettings) -> Result<()> {
    let resolution = engine.resolution()?;
    let params = engine.pipeline_params();
    let scene = load_scene(&args, resolution)?;
    info!(
        %resolution,
        backend = ?args.backend,
        stage = %params.stage,
        "rendering headless frame"
    );

    let frame = match args.backend {
        Backend::Cpu => {
            let mut backend = CpuEngine::new(resolution);
            render_with(&mut backend, &scene, params)?
        }
        Backend::Gpu => {
            let mut backend = Engine::headless(resolution, engine.power())
                .context("failed to initialise GPU engine")?;
            let profile = backend.adapter_profile();
            if profile.is_software() {
                warn!(adapter = %profile.name, "rendering on a software rasterizer");
            }
            let frame = render_with(&mut backend, &scene, params)?;
            backend.release();
            frame
        }
    };

    write_png(&args.output, &frame)?;
    info!(path = %args.output.display(), "frame written");
    Ok(())
}

fn render_with<B: RenderBackend>(
    backend: &mut B,
    scene: &Scene,
    params: PipelineParams,
) -> Result<Frame> {
    match scene {
        Scene::Single(pixels) => backend.update_scene_texture(pixels)?,
        Scene::Layers { color, emissive } => {
            backend.update_color_scene(color)?;
            backend.update_emissive_scene(emissive)?;
        }
    }
    backend.set_params(params);
    backend.render().context("failed to render frame")?;
    Ok(backend.read_frame()?)
}

fn load_scene(args: &RenderArgs, resolution: Resolution) -> Result<Scene> {
    if let Some(path) = &args.scene {
        return Ok(Scene::Single(load_png(path, resolution)?));
    }
    if let (Some(color), Some(emissive)) = (&args.color, &args.emissive) {
        return Ok(Scene::Layers {
            color: load_png(color, resolution)?,
            emissive: load_png(emissive, resolution)?,
        });
    }
    let radius = args
        .disk
        .unwrap_or(resolution.max_edge() as f32 / 8.0);
    if !radius.is_finite() || radius < 0.0 {
        bail!("disk radius must be a non-negative number");
    }
    Ok(Scene::Single(disk_scene(resolution, radius)))
}

/// White disk of `radius` pixels centered in an otherwise empty scene.
pub fn disk_scene(resolution: Resolution, radius: f32) -> Vec<u8> {
    let mut canvas = Canvas::new(resolution);
    let [width, height] = resolution.as_vec2();
    canvas.fill_circle([width / 2.0, height / 2.0], radius, WHITE);
    canvas.pixels().to_vec()
}

fn load_png(path: &Path, resolution: Resolution) -> Result<Vec<u8>> {
    let image = image::open(path)
        .with_context(|| format!("failed to open scene image at {}", path.display()))?;
    let (width, height) = image.dimensions();
    if (width, height) != (resolution.width(), resolution.height()) {
        bail!(
            "scene image {} is {width}x{height}, expected {resolution}",
            path.display()
        );
    }
    Ok(image.to_rgba8().into_raw())
}

fn write_png(path: &Path, frame: &Frame) -> Result<()> {
    let image = RgbaImage::from_raw(
        frame.resolution.width(),
        frame.resolution.height(),
        frame.pixels.clone(),
    )
    .ok_or_else(|| anyhow!("frame buffer does not match {}", frame.resolution))?;
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_scene_is_centered() {
        let resolution = Resolution::new(16, 16).unwrap();
        let pixels = disk_scene(resolution, 3.0);
        let at = |x: u32, y: u32| {
            let offset = ((y * 16 + x) * 4) as usize;
            &pixels[offset..offset + 4]
        };
        assert_eq!(at(8, 8), &WHITE);
        assert_eq!(at(7, 7), &WHITE);
        assert_eq!(at(0, 0), &[0, 0, 0, 0]);
    }

    #[test]
    fn cpu_backend_renders_lit_disk() {
        let resolution = Resolution::new(32, 32).unwrap();
        let scene = Scene::Single(disk_scene(resolution, 4.0));
        let params = PipelineParams {
            stage: radiance::Stage::PathtracingGi,
            ..PipelineParams::default()
        };
        let mut backend = CpuEngine::new(resolution);
        let frame = render_with(&mut backend, &scene, params).unwrap();
        assert_eq!(frame.pixels.len(), resolution.rgba8_len());
        assert!(frame.luminance(16, 16).unwrap() > frame.luminance(2, 2).unwrap());
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let resolution = Resolution::new(8, 4).unwrap();
        let frame = Frame {
            resolution,
            pixels: (0..resolution.rgba8_len()).map(|i| i as u8).collect(),
        };
        write_png(&path, &frame).unwrap();
        assert_eq!(load_png(&path, resolution).unwrap(), frame.pixels);
        assert!(load_png(&path, Resolution::new(4, 8).unwrap()).is_err());
    }
}
