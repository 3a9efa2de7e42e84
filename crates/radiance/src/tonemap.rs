//! Exposure and tone curves used by the present program.

use crate::types::Tonemapper;

/// Narkowicz's fit of the ACES filmic reference curve, clamped to `[0, 1]`.
pub fn aces_filmic(x: f32) -> f32 {
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(0.0, 1.0)
}

/// Scales linear radiance by `2^stops`.
pub fn expose(rgb: [f32; 3], stops: f32) -> [f32; 3] {
    let scale = stops.exp2();
    rgb.map(|channel| channel * scale)
}

/// Exposure followed by the selected curve.
pub fn apply_post(rgb: [f32; 3], exposure: f32, tonemapper: Tonemapper) -> [f32; 3] {
    let exposed = expose(rgb, exposure);
    match tonemapper {
        Tonemapper::None => exposed,
        Tonemapper::AcesFilmic => exposed.map(aces_filmic),
    }
}

/// Converts a display value to an 8-bit channel, as a unorm render target does.
pub fn to_unorm8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
