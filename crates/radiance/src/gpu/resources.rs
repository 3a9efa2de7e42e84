use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::EngineError;
use crate::noise::{blue_noise_tile, BLUE_NOISE_SIZE};
use crate::types::{Resolution, RGBA8_BYTES_PER_PIXEL};

use super::context::FLOAT_TARGET_FORMAT;

/// Format of both scene layers.
pub(crate) const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];
const QUAD_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
const QUAD_INDICES: [u32; 6] = [0, 1, 2, 1, 2, 3];

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const UV_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

/// Two triangles covering the viewport, shared by every program.
pub(crate) struct ScreenQuad {
    positions: wgpu::Buffer,
    uvs: wgpu::Buffer,
    indices: wgpu::Buffer,
}

impl ScreenQuad {
    pub fn new(device: &wgpu::Device) -> Self {
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen quad positions"),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uvs = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen quad uvs"),
            contents: bytemuck::cast_slice(&QUAD_UVS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("screen quad indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            positions,
            uvs,
            indices,
        }
    }

    pub fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
        let stride = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;
        [
            wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &UV_ATTRIBUTES,
            },
        ]
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.positions.slice(..));
        pass.set_vertex_buffer(1, self.uvs.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

/// A texture with its default view.
pub(crate) struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(
        device: &wgpu::Device,
        label: &str,
        resolution: Resolution,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(resolution),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Float target written by a render pass and read by later passes.
    pub fn float(device: &wgpu::Device, label: &str, resolution: Resolution) -> Self {
        Self::new(
            device,
            label,
            resolution,
            FLOAT_TARGET_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        )
    }

    /// RGBA8 scene layer filled from host memory.
    pub fn scene(device: &wgpu::Device, label: &str, resolution: Resolution) -> Self {
        Self::new(
            device,
            label,
            resolution,
            SCENE_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Display texture used when no window surface exists.
    pub fn offscreen(
        device: &wgpu::Device,
        resolution: Resolution,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::new(
            device,
            "offscreen display",
            resolution,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )
    }

    pub fn write_rgba8(
        &self,
        queue: &wgpu::Queue,
        resolution: Resolution,
        pixels: &[u8],
    ) -> Result<(), EngineError> {
        resolution.check_rgba8(pixels)?;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(resolution.width() * RGBA8_BYTES_PER_PIXEL as u32),
                rows_per_image: Some(resolution.height()),
            },
            extent(resolution),
        );
        Ok(())
    }
}

pub(crate) fn extent(resolution: Resolution) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: resolution.width(),
        height: resolution.height(),
        depth_or_array_layers: 1,
    }
}

/// Every texture the pipeline renders into or samples from.
pub(crate) struct TargetSet {
    pub color: Target,
    pub emissive: Target,
    pub jfa: [Target; 2],
    pub distance: Target,
    pub radiance: Target,
    pub blue_noise: Target,
}

impl TargetSet {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, resolution: Resolution) -> Self {
        Self {
            color: Target::scene(device, "color scene", resolution),
            emissive: Target::scene(device, "emissive scene", resolution),
            jfa: [
                Target::float(device, "jfa ping", resolution),
                Target::float(device, "jfa pong", resolution),
            ],
            distance: Target::float(device, "distance field", resolution),
            radiance: Target::float(device, "radiance", resolution),
            blue_noise: create_blue_noise(device, queue),
        }
    }
}

fn create_blue_noise(device: &wgpu::Device, queue: &wgpu::Queue) -> Target {
    let tile = blue_noise_tile();
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("blue noise tile"),
            size: wgpu::Extent3d {
                width: BLUE_NOISE_SIZE,
                height: BLUE_NOISE_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        bytemuck::cast_slice(&tile),
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Target { texture, view }
}

/// Nearest, clamped sampler; filtering would blend seed coordinates.
pub(crate) fn create_nearest_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("nearest sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
