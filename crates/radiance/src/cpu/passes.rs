//! Host implementations of the five shader programs.
//!
//! Every function mirrors one fragment program in `gpu::shaders`: same seed
//! rule, sentinel, neighbour scan order and march loop. Texels are stored as
//! `[f32; 4]` like the Rgba32Float targets on the GPU.

use crate::jfa::JfaPass;
use crate::noise::{ray_angle, Jitter};
use crate::tonemap::{apply_post, to_unorm8};
use crate::types::{DisplayView, PipelineParams, Resolution, TraceConfig};

pub(crate) type Texel = [f32; 4];

/// Value written where no seed has been found yet.
pub(crate) const SENTINEL: Texel = [0.0; 4];

fn has_seed(texel: &Texel) -> bool {
    texel[2] > 0.0
}

fn pixel_center(x: u32, y: u32) -> [f32; 2] {
    [x as f32 + 0.5, y as f32 + 0.5]
}

/// Seed program: opaque pixels of either layer emit their own UV.
pub(crate) fn seed(resolution: Resolution, color: &[u8], emissive: &[u8], out: &mut [Texel]) {
    let [inv_w, inv_h] = resolution.inverse();
    for y in 0..resolution.height() {
        for x in 0..resolution.width() {
            let index = resolution.index(x, y);
            let alpha = index * 4 + 3;
            out[index] = if color[alpha] > 0 || emissive[alpha] > 0 {
                let [cx, cy] = pixel_center(x, y);
                [cx * inv_w, cy * inv_h, 1.0, 0.0]
            } else {
                SENTINEL
            };
        }
    }
}

/// One jump flooding iteration.
///
/// Neighbours are scanned row by row (`dy` outer, `dx` inner, both from -1 to
/// 1). A candidate replaces the current best only when strictly nearer, so on
/// ties the earliest neighbour in scan order wins.
pub(crate) fn jfa_step(resolution: Resolution, pass: &JfaPass, src: &[Texel], dst: &mut [Texel]) {
    let res = resolution.as_vec2();
    let step = pass.offset as i64;
    let (width, height) = (resolution.width() as i64, resolution.height() as i64);
    for y in 0..resolution.height() {
        for x in 0..resolution.width() {
            let [px, py] = pixel_center(x, y);
            let mut best = SENTINEL;
            let mut best_distance = f32::INFINITY;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = x as i64 + dx * step;
                    let sy = y as i64 + dy * step;
                    if sx < 0 || sy < 0 || sx >= width || sy >= height {
                        continue;
                    }
                    let sample = src[resolution.index(sx as u32, sy as u32)];
                    if !has_seed(&sample) {
                        continue;
                    }
                    let ddx = sample[0] * res[0] - px;
                    let ddy = sample[1] * res[1] - py;
                    let distance = ddx * ddx + ddy * ddy;
                    if distance < best_distance {
                        best_distance = distance;
                        best = sample;
                    }
                }
            }
            dst[resolution.index(x, y)] = best;
        }
    }
}

/// Distance extraction: `(distance_px, seed_u, seed_v, 1)` or the saturated
/// `(empty_distance, 0, 0, 0)` for pixels without a seed.
pub(crate) fn distance_field(resolution: Resolution, jfa: &[Texel], out: &mut [Texel]) {
    let res = resolution.as_vec2();
    let empty = resolution.diagonal();
    for y in 0..resolution.height() {
        for x in 0..resolution.width() {
            let index = resolution.index(x, y);
            let sample = jfa[index];
            out[index] = if has_seed(&sample) {
                let [px, py] = pixel_center(x, y);
                let dx = sample[0] * res[0] - px;
                let dy = sample[1] * res[1] - py;
                [(dx * dx + dy * dy).sqrt(), sample[0], sample[1], 1.0]
            } else {
                [empty, 0.0, 0.0, 0.0]
            };
        }
    }
}

/// Per-frame inputs of the path tracer.
pub(crate) struct TraceInputs<'a> {
    pub emissive: &'a [u8],
    pub field: &'a [Texel],
    pub jitter: Jitter<'a>,
    pub ray_count: u32,
    pub config: TraceConfig,
}

/// Path tracer: average of `ray_count` sphere-traced rays per pixel.
pub(crate) fn trace(resolution: Resolution, inputs: &TraceInputs<'_>, out: &mut [Texel]) {
    let rays = inputs.ray_count.max(1);
    for y in 0..resolution.height() {
        for x in 0..resolution.width() {
            let origin = pixel_center(x, y);
            let mut sum = [0.0f32; 3];
            for ray in 0..rays {
                let angle = ray_angle(ray, rays, inputs.jitter.sample(x, y, ray));
                let gathered = march(resolution, inputs, origin, [angle.cos(), angle.sin()]);
                for (total, value) in sum.iter_mut().zip(gathered) {
                    *total += value;
                }
            }
            let n = rays as f32;
            out[resolution.index(x, y)] = [sum[0] / n, sum[1] / n, sum[2] / n, 1.0];
        }
    }
}

fn march(
    resolution: Resolution,
    inputs: &TraceInputs<'_>,
    origin: [f32; 2],
    direction: [f32; 2],
) -> [f32; 3] {
    let [width, height] = resolution.as_vec2();
    let config = &inputs.config;
    let mut travelled = 0.0f32;
    for _ in 0..config.max_steps {
        let px = origin[0] + direction[0] * travelled;
        let py = origin[1] + direction[1] * travelled;
        if px < 0.0 || py < 0.0 || px >= width || py >= height {
            return config.ambient;
        }
        let field = inputs.field[resolution.index(px as u32, py as u32)];
        if field[3] > 0.0 && field[0] <= config.hit_epsilon {
            let radiance = emissive_at(resolution, inputs.emissive, field[1], field[2]);
            let attenuation = 1.0 + config.falloff * travelled;
            return radiance.map(|channel| channel / attenuation);
        }
        travelled += field[0];
    }
    [0.0; 3]
}

fn emissive_at(resolution: Resolution, emissive: &[u8], u: f32, v: f32) -> [f32; 3] {
    let x = ((u * resolution.width() as f32).floor() as u32).min(resolution.width() - 1);
    let y = ((v * resolution.height() as f32).floor() as u32).min(resolution.height() - 1);
    let offset = resolution.index(x, y) * 4;
    [
        emissive[offset] as f32 / 255.0,
        emissive[offset + 1] as f32 / 255.0,
        emissive[offset + 2] as f32 / 255.0,
    ]
}

/// Source texture handed to the present program.
pub(crate) enum PresentSource<'a> {
    Rgba8(&'a [u8]),
    Float(&'a [Texel]),
}

/// Present program: maps the selected view to RGBA8.
pub(crate) fn present(
    resolution: Resolution,
    view: DisplayView,
    source: PresentSource<'_>,
    params: &PipelineParams,
    out: &mut [u8],
) {
    let distance_scale = 2.0 / resolution.max_edge() as f32;
    let post = params.post_active();
    for index in 0..resolution.pixel_count() {
        let texel = match source {
            PresentSource::Rgba8(bytes) => {
                let offset = index * 4;
                [
                    bytes[offset] as f32 / 255.0,
                    bytes[offset + 1] as f32 / 255.0,
                    bytes[offset + 2] as f32 / 255.0,
                    bytes[offset + 3] as f32 / 255.0,
                ]
            }
            PresentSource::Float(texels) => texels[index],
        };
        let color = match view {
            DisplayView::Color => texel,
            DisplayView::SeedUv => [texel[0], texel[1], 0.0, 1.0],
            DisplayView::Distance => {
                let gray = texel[0] * distance_scale;
                [gray, gray, gray, 1.0]
            }
            DisplayView::Radiance => {
                let rgb = [texel[0], texel[1], texel[2]];
                let [r, g, b] = if post {
                    apply_post(rgb, params.exposure, params.tonemapper)
                } else {
                    rgb
                };
                [r, g, b, 1.0]
            }
        };
        let offset = index * 4;
        for (channel, value) in color.into_iter().enumerate() {
            out[offset + channel] = to_unorm8(value);
        }
    }
}
