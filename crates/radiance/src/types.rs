use std::fmt;
use std::ops::RangeInclusive;

use crate::error::EngineError;

/// Inclusive range accepted for the user-tunable JFA pass cap.
pub const JFA_PASS_RANGE: RangeInclusive<u32> = 1..=12;

/// Inclusive range accepted for the number of rays traced per pixel.
pub const RAY_COUNT_RANGE: RangeInclusive<u32> = 4..=80;

/// Inclusive range accepted for the exposure stop value.
pub const EXPOSURE_RANGE: RangeInclusive<f32> = -5.0..=5.0;

/// Bytes per pixel of every RGBA8 scene buffer.
pub const RGBA8_BYTES_PER_PIXEL: usize = 4;

/// Fixed pixel size of the engine and of every texture it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Builds a resolution, rejecting zero-sized edges.
    pub fn new(width: u32, height: u32) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidResolution { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length in bytes an RGBA8 buffer of this size must have.
    pub fn rgba8_len(&self) -> usize {
        self.pixel_count() * RGBA8_BYTES_PER_PIXEL
    }

    pub fn max_edge(&self) -> u32 {
        self.width.max(self.height)
    }

    pub fn as_vec2(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    pub fn inverse(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    /// Euclidean length of the image diagonal in pixels.
    ///
    /// Used as the saturated distance reported for pixels that have no seed,
    /// which is far enough that any ray stepping by it leaves the image.
    pub fn diagonal(&self) -> f32 {
        let [w, h] = self.as_vec2();
        (w * w + h * h).sqrt()
    }

    /// Rejects scene buffers whose length does not match `W * H * 4`.
    pub fn check_rgba8(&self, pixels: &[u8]) -> Result<(), EngineError> {
        let expected = self.rgba8_len();
        if pixels.len() != expected {
            return Err(EngineError::SizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pipeline stage selected for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Display the color scene directly.
    #[default]
    Painting,
    /// Run the capped JFA and display the nearest-seed UVs.
    Jfa,
    /// Run the converged JFA plus extraction and display distances.
    DistanceField,
    /// Run the full chain and display the tone mapped lighting estimate.
    PathtracingGi,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Painting,
        Stage::Jfa,
        Stage::DistanceField,
        Stage::PathtracingGi,
    ];

    /// Numeric code used by the external parameter interface (1-4).
    pub fn code(self) -> u32 {
        match self {
            Stage::Painting => 1,
            Stage::Jfa => 2,
            Stage::DistanceField => 3,
            Stage::PathtracingGi => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Painting => "Painting",
            Stage::Jfa => "JFA",
            Stage::DistanceField => "Distance Field",
            Stage::PathtracingGi => "Pathtracing GI",
        }
    }
}

impl TryFrom<u32> for Stage {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Stage::Painting),
            2 => Ok(Stage::Jfa),
            3 => Ok(Stage::DistanceField),
            4 => Ok(Stage::PathtracingGi),
            other => Err(EngineError::InvalidParameter {
                name: "stage",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Strategy used to distribute ray angles in the path tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseMethod {
    /// Fixed angular stride, identical for every pixel.
    #[default]
    None,
    /// Stateless integer hash of pixel coordinates and ray index.
    PseudoRandomHash,
    /// Precomputed low-discrepancy tile repeated across the image.
    BlueNoise,
}

impl NoiseMethod {
    pub fn code(self) -> u32 {
        match self {
            NoiseMethod::None => 0,
            NoiseMethod::PseudoRandomHash => 1,
            NoiseMethod::BlueNoise => 2,
        }
    }

    /// Cycles through the methods in code order.
    pub fn next(self) -> Self {
        match self {
            NoiseMethod::None => NoiseMethod::PseudoRandomHash,
            NoiseMethod::PseudoRandomHash => NoiseMethod::BlueNoise,
            NoiseMethod::BlueNoise => NoiseMethod::None,
        }
    }
}

impl TryFrom<u32> for NoiseMethod {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NoiseMethod::None),
            1 => Ok(NoiseMethod::PseudoRandomHash),
            2 => Ok(NoiseMethod::BlueNoise),
            other => Err(EngineError::InvalidParameter {
                name: "noise_method",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for NoiseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseMethod::None => f.write_str("none"),
            NoiseMethod::PseudoRandomHash => f.write_str("hash"),
            NoiseMethod::BlueNoise => f.write_str("blue-noise"),
        }
    }
}

/// Curve applied after exposure when post-processing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tonemapper {
    #[default]
    None,
    AcesFilmic,
}

impl Tonemapper {
    pub fn code(self) -> u32 {
        match self {
            Tonemapper::None => 0,
            Tonemapper::AcesFilmic => 1,
        }
    }
}

impl TryFrom<u32> for Tonemapper {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Tonemapper::None),
            1 => Ok(Tonemapper::AcesFilmic),
            other => Err(EngineError::InvalidParameter {
                name: "tonemapper",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Tonemapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tonemapper::None => f.write_str("none"),
            Tonemapper::AcesFilmic => f.write_str("aces"),
        }
    }
}

/// Tunable pipeline state read by the engine every frame.
///
/// Values are expected to be clamped to the documented ranges by whoever sets
/// them; the engine does not re-validate them per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    pub stage: Stage,
    /// Pass cap used only when the JFA stage itself is displayed.
    pub jfa_passes: u32,
    pub ray_count: u32,
    pub noise_method: NoiseMethod,
    /// Exposure in stops; the radiance is scaled by `2^exposure`.
    pub exposure: f32,
    pub enable_post: bool,
    pub tonemapper: Tonemapper,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            stage: Stage::Painting,
            jfa_passes: 1,
            ray_count: 16,
            noise_method: NoiseMethod::None,
            exposure: 0.0,
            enable_post: true,
            tonemapper: Tonemapper::AcesFilmic,
        }
    }
}

impl PipelineParams {
    /// Returns a copy with every numeric field clamped to its documented range.
    pub fn clamped(self) -> Self {
        Self {
            jfa_passes: self
                .jfa_passes
                .clamp(*JFA_PASS_RANGE.start(), *JFA_PASS_RANGE.end()),
            ray_count: self
                .ray_count
                .clamp(*RAY_COUNT_RANGE.start(), *RAY_COUNT_RANGE.end()),
            exposure: if self.exposure.is_finite() {
                self.exposure
                    .clamp(*EXPOSURE_RANGE.start(), *EXPOSURE_RANGE.end())
            } else {
                0.0
            },
            ..self
        }
    }

    /// Whether exposure and tonemapping apply to the displayed image.
    pub fn post_active(&self) -> bool {
        self.enable_post && self.stage == Stage::PathtracingGi
    }
}

/// Preferred adapter class when several GPUs are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Fixed ray-marching constants, not exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceConfig {
    /// Sphere-tracing iterations before a ray is abandoned (contributes black).
    pub max_steps: u32,
    /// A ray hits when the local distance is at most this many pixels. Seed
    /// pixels report zero and every other pixel at least one.
    pub hit_epsilon: f32,
    /// Hit radiance is divided by `1 + falloff * travelled_pixels`.
    pub falloff: f32,
    /// Radiance gathered by rays that leave the image.
    pub ambient: [f32; 3],
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_steps: 128,
            hit_epsilon: 0.5,
            falloff: 0.01,
            ambient: [0.0; 3],
        }
    }
}

/// What the present program shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayView {
    Color,
    SeedUv,
    Distance,
    Radiance,
}

impl DisplayView {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Painting => DisplayView::Color,
            Stage::Jfa => DisplayView::SeedUv,
            Stage::DistanceField => DisplayView::Distance,
            Stage::PathtracingGi => DisplayView::Radiance,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            DisplayView::Color => 0,
            DisplayView::SeedUv => 1,
            DisplayView::Distance => 2,
            DisplayView::Radiance => 3,
        }
    }
}
