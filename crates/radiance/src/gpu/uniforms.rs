//! std140 uniform blocks, one per program.
//!
//! Field order and padding must match the `layout(std140, set = 0, binding = 0)`
//! block declared by the program in `shaders.rs`.

use bytemuck::{Pod, Zeroable};

use crate::types::{DisplayView, PipelineParams, Resolution, TraceConfig};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct SeedUniforms {
    pub inv_resolution: [f32; 2],
    pub _pad: [f32; 2],
}

impl SeedUniforms {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            inv_resolution: resolution.inverse(),
            _pad: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct JfaUniforms {
    pub resolution: [f32; 2],
    /// Step in normalized texture units.
    pub offset: [f32; 2],
}

impl JfaUniforms {
    pub fn new(resolution: Resolution, offset: [f32; 2]) -> Self {
        Self {
            resolution: resolution.as_vec2(),
            offset,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct DistanceUniforms {
    pub resolution: [f32; 2],
    pub empty_distance: f32,
    pub _pad: f32,
}

impl DistanceUniforms {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution: resolution.as_vec2(),
            empty_distance: resolution.diagonal(),
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct TraceUniforms {
    pub resolution: [f32; 2],
    pub ray_count: i32,
    pub noise_method: i32,
    pub falloff: f32,
    pub hit_epsilon: f32,
    pub max_steps: i32,
    pub _pad: f32,
    pub ambient: [f32; 4],
}

impl TraceUniforms {
    pub fn new(resolution: Resolution, params: &PipelineParams, config: &TraceConfig) -> Self {
        let [r, g, b] = config.ambient;
        Self {
            resolution: resolution.as_vec2(),
            ray_count: params.ray_count.max(1) as i32,
            noise_method: params.noise_method.code() as i32,
            falloff: config.falloff,
            hit_epsilon: config.hit_epsilon,
            max_steps: config.max_steps as i32,
            _pad: 0.0,
            ambient: [r, g, b, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct PresentUniforms {
    pub exposure: f32,
    pub tonemapper: i32,
    pub post: i32,
    pub view: i32,
    pub distance_scale: f32,
    pub _pad: [f32; 3],
}

impl PresentUniforms {
    pub fn new(resolution: Resolution, params: &PipelineParams) -> Self {
        Self {
            exposure: params.exposure,
            tonemapper: params.tonemapper.code() as i32,
            post: params.post_active() as i32,
            view: DisplayView::for_stage(params.stage).code(),
            distance_scale: 2.0 / resolution.max_edge() as f32,
            _pad: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;
    use crate::types::{NoiseMethod, Stage, Tonemapper};

    #[test]
    fn blocks_are_std140_sized() {
        assert_eq!(size_of::<SeedUniforms>(), 16);
        assert_eq!(size_of::<JfaUniforms>(), 16);
        assert_eq!(size_of::<DistanceUniforms>(), 16);
        assert_eq!(size_of::<TraceUniforms>(), 48);
        assert_eq!(size_of::<PresentUniforms>(), 32);
    }

    #[test]
    fn present_enables_post_only_for_radiance() {
        let resolution = Resolution::new(200, 100).unwrap();
        let mut params = PipelineParams {
            tonemapper: Tonemapper::AcesFilmic,
            ..PipelineParams::default()
        };
        let painting = PresentUniforms::new(resolution, &params);
        assert_eq!(painting.post, 0);
        assert_eq!(painting.view, 0);
        assert_eq!(painting.distance_scale, 0.01);

        params.stage = Stage::PathtracingGi;
        let lit = PresentUniforms::new(resolution, &params);
        assert_eq!(lit.post, 1);
        assert_eq!(lit.view, 3);
        assert_eq!(lit.tonemapper, 1);
    }

    #[test]
    fn trace_block_carries_codes() {
        let resolution = Resolution::new(64, 32).unwrap();
        let params = PipelineParams {
            ray_count: 24,
            noise_method: NoiseMethod::BlueNoise,
            ..PipelineParams::default()
        };
        let block = TraceUniforms::new(resolution, &params, &TraceConfig::default());
        assert_eq!(block.resolution, [64.0, 32.0]);
        assert_eq!(block.ray_count, 24);
        assert_eq!(block.noise_method, 2);
        assert_eq!(block.max_steps, 128);
    }
}
