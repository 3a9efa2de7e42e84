use std::mem::size_of;

use crate::error::EngineError;

use super::context::FLOAT_TARGET_FORMAT;
use super::resources::ScreenQuad;
use super::shaders::{compile_fragment_shader, compile_vertex_shader, Program};
use super::uniforms::{DistanceUniforms, JfaUniforms, PresentUniforms, SeedUniforms, TraceUniforms};

/// Layout of the per-program uniform block in set 0, shared by all programs.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Result<Self, EngineError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let vertex_module = compile_vertex_shader(device)?;

        Ok(Self {
            uniform_layout,
            vertex_module,
        })
    }
}

/// One compiled program: render pipeline, its uniform buffer and the layout
/// its set-1 texture bind groups are built against.
pub(crate) struct StageProgram {
    pub program: Program,
    pub pipeline: wgpu::RenderPipeline,
    pub texture_layout: wgpu::BindGroupLayout,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
    uniform_size: wgpu::BufferAddress,
}

impl StageProgram {
    pub fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        program: Program,
        target_format: wgpu::TextureFormat,
        uniform_size: usize,
    ) -> Result<Self, EngineError> {
        let fragment_module = compile_fragment_shader(device, program)?;

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(program.label()),
            entries: &build_texture_layout_entries(program.texture_count()),
        });

        let uniform_size = uniform_size as wgpu::BufferAddress;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(program.label()),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(program.label()),
            bind_group_layouts: &[&layouts.uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffers = ScreenQuad::vertex_layouts();
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(program.label()),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &layouts.vertex_module,
                entry_point: Some("main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    // Float targets are not blendable; every pass overwrites.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            program,
            pipeline,
            texture_layout,
            uniform_buffer,
            uniform_bind_group,
            uniform_size,
        })
    }

    pub fn uniform_size(&self) -> wgpu::BufferAddress {
        self.uniform_size
    }

    /// Bind group over `views` in declaration order, all sampled with `sampler`.
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        label: &str,
        views: &[&wgpu::TextureView],
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        debug_assert_eq!(views.len(), self.program.texture_count());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_layout,
            entries: &build_texture_entries(views, sampler),
        })
    }
}

/// All five programs of the pipeline.
pub(crate) struct ProgramSet {
    pub present: StageProgram,
    pub seed: StageProgram,
    pub jfa: StageProgram,
    pub distance: StageProgram,
    pub trace: StageProgram,
}

impl ProgramSet {
    pub fn new(
        device: &wgpu::Device,
        display_format: wgpu::TextureFormat,
    ) -> Result<Self, EngineError> {
        let layouts = PipelineLayouts::new(device)?;
        let float = FLOAT_TARGET_FORMAT;
        Ok(Self {
            present: StageProgram::new(
                device,
                &layouts,
                Program::Present,
                display_format,
                size_of::<PresentUniforms>(),
            )?,
            seed: StageProgram::new(
                device,
                &layouts,
                Program::Seed,
                float,
                size_of::<SeedUniforms>(),
            )?,
            jfa: StageProgram::new(
                device,
                &layouts,
                Program::JfaStep,
                float,
                size_of::<JfaUniforms>(),
            )?,
            distance: StageProgram::new(
                device,
                &layouts,
                Program::DistanceField,
                float,
                size_of::<DistanceUniforms>(),
            )?,
            trace: StageProgram::new(
                device,
                &layouts,
                Program::PathTracer,
                float,
                size_of::<TraceUniforms>(),
            )?,
        })
    }
}

pub(crate) fn build_texture_entries<'a>(
    views: &[&'a wgpu::TextureView],
    sampler: &'a wgpu::Sampler,
) -> Vec<wgpu::BindGroupEntry<'a>> {
    let mut entries = Vec::with_capacity(views.len() * 2);
    for (index, view) in views.iter().copied().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    entries
}

/// Unfilterable float textures, so Rgba32Float targets bind without the
/// `FLOAT32_FILTERABLE` feature.
pub(crate) fn build_texture_layout_entries(count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count * 2);
    for index in 0..count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
            count: None,
        });
    }
    entries
}
