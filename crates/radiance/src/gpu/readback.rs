use crate::error::EngineError;
use crate::types::Resolution;

use super::resources::extent;

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Row pitch of a texture copy: tight width and the 256-byte aligned stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowPitch {
    pub unpadded: u32,
    pub padded: u32,
}

impl RowPitch {
    pub fn new(width: u32, bytes_per_pixel: u32) -> Self {
        let unpadded = width * bytes_per_pixel;
        Self {
            unpadded,
            padded: align_to(unpadded, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
        }
    }
}

/// Copies `texture` into host memory, blocking until the GPU is done.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    resolution: Resolution,
    bytes_per_pixel: u32,
) -> Result<Vec<u8>, EngineError> {
    let pitch = RowPitch::new(resolution.width(), bytes_per_pixel);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback buffer"),
        size: u64::from(pitch.padded) * u64::from(resolution.height()),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(pitch.padded),
                rows_per_image: Some(resolution.height()),
            },
        },
        extent(resolution),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| EngineError::Readback(err.to_string()))?;
    receiver
        .recv()
        .map_err(|_| EngineError::Readback("map callback was dropped".into()))?
        .map_err(|err| EngineError::Readback(err.to_string()))?;

    let mapped = slice.get_mapped_range();
    let pixels = copy_tight_rows(&mapped, pitch, resolution.height())?;
    drop(mapped);
    buffer.unmap();
    Ok(pixels)
}

fn copy_tight_rows(mapped: &[u8], pitch: RowPitch, height: u32) -> Result<Vec<u8>, EngineError> {
    let required = pitch.padded as usize * height as usize;
    if mapped.len() < required {
        return Err(EngineError::Readback(format!(
            "mapped buffer holds {} bytes, expected at least {required}",
            mapped.len()
        )));
    }
    let row = pitch.unpadded as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in mapped.chunks(pitch.padded as usize).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    Ok(pixels)
}
