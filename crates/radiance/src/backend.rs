use crate::error::EngineError;
use crate::types::{PipelineParams, Resolution};

/// A rendered RGBA8 frame, row-major with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub resolution: Resolution,
    pub pixels: Vec<u8>,
}

impl Frame {
    /// RGBA8 value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if !self.resolution.contains(x, y) {
            return None;
        }
        let offset = self.resolution.index(x, y) * 4;
        let mut rgba = [0; 4];
        rgba.copy_from_slice(self.pixels.get(offset..offset + 4)?);
        Some(rgba)
    }

    /// Mean of the RGB channels at `(x, y)`, in `[0, 1]`.
    pub fn luminance(&self, x: u32, y: u32) -> Option<f32> {
        let [r, g, b, _] = self.pixel(x, y)?;
        Some((r as f32 + g as f32 + b as f32) / (3.0 * 255.0))
    }
}

/// Per-frame surface shared by the GPU engine and the CPU reference.
///
/// Callers upload the scene layers, adjust [`PipelineParams`], then call
/// [`RenderBackend::render`]. Frames are produced synchronously; a second
/// `render` must not start before the first returns, which `&mut self`
/// already enforces.
pub trait RenderBackend {
    fn resolution(&self) -> Resolution;

    fn params(&self) -> &PipelineParams;

    fn params_mut(&mut self) -> &mut PipelineParams;

    /// Replaces the diffuse/color layer. Fails with `SizeMismatch` unless the
    /// buffer holds exactly `W * H * 4` bytes.
    fn update_color_scene(&mut self, pixels: &[u8]) -> Result<(), EngineError>;

    /// Replaces the emissive layer.
    fn update_emissive_scene(&mut self, pixels: &[u8]) -> Result<(), EngineError>;

    /// Single-layer variant: the buffer becomes both the color and the
    /// emissive layer.
    fn update_scene_texture(&mut self, pixels: &[u8]) -> Result<(), EngineError> {
        self.update_color_scene(pixels)?;
        self.update_emissive_scene(pixels)
    }

    /// Runs the pass chain for the selected stage and writes one frame to the
    /// display target.
    fn render(&mut self) -> Result<(), EngineError>;

    /// Returns the last rendered frame.
    fn read_frame(&mut self) -> Result<Frame, EngineError>;

    fn set_params(&mut self, params: PipelineParams) {
        *self.params_mut() = params;
    }
}
