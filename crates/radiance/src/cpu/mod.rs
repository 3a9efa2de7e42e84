//! Host reference backend.
//!
//! [`CpuEngine`] runs the same pass chain as [`crate::gpu::Engine`] on plain
//! vectors. It needs no adapter, which makes it the backend of choice for
//! tests, headless batch renders and for checking GPU output.

mod passes;

use tracing::trace;

use crate::backend::{Frame, RenderBackend};
use crate::error::EngineError;
use crate::jfa::{JfaMode, PassPlan, PingPong};
use crate::noise::{blue_noise_tile, Jitter};
use crate::types::{DisplayView, PipelineParams, Resolution, Stage, TraceConfig};

use passes::{PresentSource, Texel, TraceInputs, SENTINEL};

pub struct CpuEngine {
    resolution: Resolution,
    params: PipelineParams,
    trace_config: TraceConfig,
    color: Vec<u8>,
    emissive: Vec<u8>,
    jfa_targets: [Vec<Texel>; 2],
    jfa_output: PingPong,
    distance: Vec<Texel>,
    radiance: Vec<Texel>,
    blue_noise: Vec<f32>,
    display: Vec<u8>,
}

impl CpuEngine {
    pub fn new(resolution: Resolution) -> Self {
        Self::with_params(resolution, PipelineParams::default())
    }

    pub fn with_params(resolution: Resolution, params: PipelineParams) -> Self {
        let texels = resolution.pixel_count();
        Self {
            resolution,
            params,
            trace_config: TraceConfig::default(),
            color: vec![0; resolution.rgba8_len()],
            emissive: vec![0; resolution.rgba8_len()],
            jfa_targets: [vec![SENTINEL; texels], vec![SENTINEL; texels]],
            jfa_output: PingPong::A,
            distance: vec![SENTINEL; texels],
            radiance: vec![SENTINEL; texels],
            blue_noise: blue_noise_tile(),
            display: vec![0; resolution.rgba8_len()],
        }
    }

    pub fn trace_config(&self) -> &TraceConfig {
        &self.trace_config
    }

    pub fn set_trace_config(&mut self, config: TraceConfig) {
        self.trace_config = config;
    }

    /// Output of the last propagation run, `(u, v, 1, 0)` per seeded pixel.
    pub fn jfa_output(&self) -> &[[f32; 4]] {
        &self.jfa_targets[self.jfa_output.index()]
    }

    /// Distance field of the last frame that reached stage 3 or 4.
    pub fn distance_field(&self) -> &[[f32; 4]] {
        &self.distance
    }

    /// Linear radiance of the last frame that reached stage 4.
    pub fn radiance(&self) -> &[[f32; 4]] {
        &self.radiance
    }

    fn run_jfa(&mut self, mode: JfaMode) {
        let plan = PassPlan::new(mode, self.resolution);
        for target in &mut self.jfa_targets {
            target.fill(SENTINEL);
        }
        passes::seed(
            self.resolution,
            &self.color,
            &self.emissive,
            &mut self.jfa_targets[PingPong::A.index()],
        );
        for pass in plan.passes() {
            let [a, b] = &mut self.jfa_targets;
            let (src, dst) = match pass.read {
                PingPong::A => (&*a, b),
                PingPong::B => (&*b, a),
            };
            passes::jfa_step(self.resolution, &pass, src, dst);
        }
        self.jfa_output = plan.output();
        trace!(passes = plan.len(), output = ?self.jfa_output, "jump flooding finished");
    }

    fn extract_distance(&mut self) {
        let jfa = &self.jfa_targets[self.jfa_output.index()];
        passes::distance_field(self.resolution, jfa, &mut self.distance);
    }

    fn trace_radiance(&mut self) {
        let inputs = TraceInputs {
            emissive: &self.emissive,
            field: &self.distance,
            jitter: Jitter::new(self.params.noise_method, &self.blue_noise),
            ray_count: self.params.ray_count,
            config: self.trace_config,
        };
        passes::trace(self.resolution, &inputs, &mut self.radiance);
    }
}

impl RenderBackend for CpuEngine {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn params(&self) -> &PipelineParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut PipelineParams {
        &mut self.params
    }

    fn update_color_scene(&mut self, pixels: &[u8]) -> Result<(), EngineError> {
        self.resolution.check_rgba8(pixels)?;
        self.color.copy_from_slice(pixels);
        Ok(())
    }

    fn update_emissive_scene(&mut self, pixels: &[u8]) -> Result<(), EngineError> {
        self.resolution.check_rgba8(pixels)?;
        self.emissive.copy_from_slice(pixels);
        Ok(())
    }

    fn render(&mut self) -> Result<(), EngineError> {
        let stage = self.params.stage;
        trace!(stage = %stage, "rendering frame on cpu");
        match stage {
            Stage::Painting => {}
            Stage::Jfa => self.run_jfa(JfaMode::Capped(self.params.jfa_passes)),
            Stage::DistanceField => {
                self.run_jfa(JfaMode::Converged);
                self.extract_distance();
            }
            Stage::PathtracingGi => {
                self.run_jfa(JfaMode::Converged);
                self.extract_distance();
                self.trace_radiance();
            }
        }

        let source = match stage {
            Stage::Painting => PresentSource::Rgba8(&self.color),
            Stage::Jfa => PresentSource::Float(&self.jfa_targets[self.jfa_output.index()]),
            Stage::DistanceField => PresentSource::Float(&self.distance),
            Stage::PathtracingGi => PresentSource::Float(&self.radiance),
        };
        passes::present(
            self.resolution,
            DisplayView::for_stage(stage),
            source,
            &self.params,
            &mut self.display,
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, EngineError> {
        Ok(Frame {
            resolution: self.resolution,
            pixels: self.display.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jfa::full_convergence_passes;
    use crate::types::NoiseMethod;

    fn engine(width: u32, height: u32) -> CpuEngine {
        CpuEngine::new(Resolution::new(width, height).unwrap())
    }

    fn single_pixel_scene(resolution: Resolution, x: u32, y: u32) -> Vec<u8> {
        let mut pixels = vec![0u8; resolution.rgba8_len()];
        let offset = resolution.index(x, y) * 4;
        pixels[offset..offset + 4].copy_from_slice(&[255, 255, 255, 255]);
        pixels
    }

    fn disk_scene(resolution: Resolution, radius: f32) -> Vec<u8> {
        let mut pixels = vec![0u8; resolution.rgba8_len()];
        let cx = resolution.width() as f32 / 2.0;
        let cy = resolution.height() as f32 / 2.0;
        for y in 0..resolution.height() {
            for x in 0..resolution.width() {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    let offset = resolution.index(x, y) * 4;
                    pixels[offset..offset + 4].copy_from_slice(&[255, 255, 255, 255]);
                }
            }
        }
        pixels
    }

    fn seed_pixel(resolution: Resolution, texel: &[f32; 4]) -> (u32, u32) {
        (
            (texel[0] * resolution.width() as f32).floor() as u32,
            (texel[1] * resolution.height() as f32).floor() as u32,
        )
    }

    #[test]
    fn scene_updates_reject_wrong_sizes() {
        let mut engine = engine(8, 4);
        let err = engine.update_color_scene(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SizeMismatch {
                expected: 128,
                actual: 10
            }
        ));
        assert!(engine.update_emissive_scene(&[0u8; 129]).is_err());
        assert!(engine.update_scene_texture(&[0u8; 127]).is_err());
        assert!(engine.update_scene_texture(&[0u8; 128]).is_ok());
    }

    #[test]
    fn empty_scene_reports_sentinel_and_saturated_distance() {
        let mut engine = engine(24, 16);
        engine.params_mut().stage = Stage::PathtracingGi;
        engine.render().unwrap();

        assert!(engine.jfa_output().iter().all(|texel| *texel == SENTINEL));
        let diagonal = engine.resolution().diagonal();
        for texel in engine.distance_field() {
            assert!(!texel[0].is_nan());
            assert_eq!(*texel, [diagonal, 0.0, 0.0, 0.0]);
        }
        for texel in engine.radiance() {
            assert_eq!(&texel[..3], &[0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn single_seed_converges_everywhere() {
        for (width, height, x0, y0) in [(64, 64, 17, 40), (37, 23, 36, 0), (100, 7, 3, 6)] {
            let mut engine = engine(width, height);
            let resolution = engine.resolution();
            engine
                .update_scene_texture(&single_pixel_scene(resolution, x0, y0))
                .unwrap();
            engine.params_mut().stage = Stage::DistanceField;
            engine.render().unwrap();

            for texel in engine.jfa_output() {
                assert_eq!(texel[2], 1.0);
                assert_eq!(seed_pixel(resolution, texel), (x0, y0));
            }
            let far = engine.distance_field()[resolution.index(0, 0)];
            let expected = ((x0 as f32).powi(2) + (y0 as f32).powi(2)).sqrt();
            assert!((far[0] - expected).abs() < 1e-3, "{far:?} vs {expected}");
        }
    }

    #[test]
    fn capped_run_displays_partial_propagation() {
        let mut engine = engine(64, 64);
        let resolution = engine.resolution();
        engine
            .update_scene_texture(&single_pixel_scene(resolution, 0, 0))
            .unwrap();
        engine.set_params(PipelineParams {
            stage: Stage::Jfa,
            jfa_passes: 1,
            ..PipelineParams::default()
        });
        engine.render().unwrap();

        // A single pass steps by one pixel, reaching only the in-bounds 3x3
        // neighbourhood of the corner seed.
        let seeded = engine
            .jfa_output()
            .iter()
            .filter(|texel| texel[2] > 0.0)
            .count();
        assert_eq!(seeded, 4);
        let frame = engine.read_frame().unwrap();
        assert_eq!(frame.pixel(63, 63), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(32, 32), Some([0, 0, 0, 255]));
        assert_eq!(frame.pixel(1, 1), Some([2, 2, 0, 255]));
    }

    #[test]
    fn pass_cap_above_convergence_is_harmless() {
        let mut engine = engine(16, 16);
        let resolution = engine.resolution();
        engine
            .update_scene_texture(&single_pixel_scene(resolution, 5, 9))
            .unwrap();
        engine.set_params(PipelineParams {
            stage: Stage::Jfa,
            jfa_passes: full_convergence_passes(resolution) + 3,
            ..PipelineParams::default()
        });
        engine.render().unwrap();
        for texel in engine.jfa_output() {
            assert_eq!(seed_pixel(resolution, texel), (5, 9));
        }
    }

    #[test]
    fn painting_stage_passes_scene_through() {
        let mut engine = engine(13, 7);
        let resolution = engine.resolution();
        let pixels: Vec<u8> = (0..resolution.rgba8_len())
            .map(|index| (index * 37 % 256) as u8)
            .collect();
        engine.update_color_scene(&pixels).unwrap();

        for (enable_post, exposure) in [(false, 3.0), (true, 0.0), (true, -2.5)] {
            engine.set_params(PipelineParams {
                stage: Stage::Painting,
                enable_post,
                exposure,
                ..PipelineParams::default()
            });
            engine.render().unwrap();
            assert_eq!(engine.read_frame().unwrap().pixels, pixels);
        }
    }

    #[test]
    fn repeated_renders_are_bit_identical() {
        let resolution = Resolution::new(48, 32).unwrap();
        let scene = disk_scene(resolution, 5.0);
        for noise_method in [
            NoiseMethod::None,
            NoiseMethod::PseudoRandomHash,
            NoiseMethod::BlueNoise,
        ] {
            let mut engine = CpuEngine::new(resolution);
            engine.update_scene_texture(&scene).unwrap();
            engine.set_params(PipelineParams {
                stage: Stage::PathtracingGi,
                noise_method,
                ..PipelineParams::default()
            });
            engine.render().unwrap();
            let first = engine.read_frame().unwrap();
            engine.render().unwrap();
            let second = engine.read_frame().unwrap();
            assert_eq!(first, second, "{noise_method}");
        }
    }

    #[test]
    fn lit_disk_is_brighter_at_its_centre() {
        let mut engine = engine(256, 256);
        let resolution = engine.resolution();
        engine
            .update_scene_texture(&disk_scene(resolution, 10.0))
            .unwrap();
        engine.set_params(PipelineParams {
            stage: Stage::PathtracingGi,
            ray_count: 16,
            noise_method: NoiseMethod::None,
            ..PipelineParams::default()
        });
        engine.render().unwrap();

        for texel in engine.radiance() {
            for channel in &texel[..3] {
                assert!(channel.is_finite());
                assert!(*channel >= 0.0);
            }
        }
        let frame = engine.read_frame().unwrap();
        assert!(frame.luminance(128, 128).unwrap() > frame.luminance(28, 128).unwrap());
        assert!(frame.luminance(128, 128).unwrap() > frame.luminance(128, 228).unwrap());
    }

    #[test]
    fn occluder_casts_a_shadow() {
        // Light on the left, an opaque black wall in the middle column.
        let resolution = Resolution::new(64, 32).unwrap();
        let mut color = vec![0u8; resolution.rgba8_len()];
        let mut emissive = vec![0u8; resolution.rgba8_len()];
        for y in 12..20 {
            for x in 2..6 {
                let offset = resolution.index(x, y) * 4;
                emissive[offset..offset + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        for y in 0..32 {
            let offset = resolution.index(32, y) * 4;
            color[offset..offset + 4].copy_from_slice(&[0, 0, 0, 255]);
        }

        let mut engine = CpuEngine::new(resolution);
        engine.update_color_scene(&color).unwrap();
        engine.update_emissive_scene(&emissive).unwrap();
        engine.set_params(PipelineParams {
            stage: Stage::PathtracingGi,
            ray_count: 32,
            ..PipelineParams::default()
        });
        engine.render().unwrap();

        let lit = engine.radiance()[resolution.index(20, 16)][0];
        let shadowed = engine.radiance()[resolution.index(44, 16)][0];
        assert!(lit > 0.0);
        assert_eq!(shadowed, 0.0);
    }
}
