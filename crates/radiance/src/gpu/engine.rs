use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use crate::backend::{Frame, RenderBackend};
use crate::error::EngineError;
use crate::jfa::{JfaMode, PassPlan, PingPong};
use crate::types::{
    GpuPowerPreference, PipelineParams, Resolution, Stage, TraceConfig, RGBA8_BYTES_PER_PIXEL,
};

use super::context::{AdapterProfile, GpuContext};
use super::pipeline::{ProgramSet, StageProgram};
use super::readback::read_texture;
use super::resources::{create_nearest_sampler, ScreenQuad, Target, TargetSet};
use super::uniforms::{
    DistanceUniforms, JfaUniforms, PresentUniforms, SeedUniforms, TraceUniforms,
};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const FLOAT_TEXEL_BYTES: u32 = 16;

enum Display {
    Surface,
    Offscreen(Target),
}

/// Set-1 bind groups for every texture a program can read. Built once,
/// since no texture is ever recreated.
struct BindGroups {
    present_color: wgpu::BindGroup,
    present_jfa: [wgpu::BindGroup; 2],
    present_distance: wgpu::BindGroup,
    present_radiance: wgpu::BindGroup,
    seed: wgpu::BindGroup,
    jfa: [wgpu::BindGroup; 2],
    distance: [wgpu::BindGroup; 2],
    trace: wgpu::BindGroup,
}

impl BindGroups {
    fn new(
        device: &wgpu::Device,
        programs: &ProgramSet,
        targets: &TargetSet,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let [ping, pong] = &targets.jfa;
        let present = &programs.present;
        Self {
            present_color: present.texture_bind_group(
                device,
                "present color",
                &[&targets.color.view],
                sampler,
            ),
            present_jfa: [
                present.texture_bind_group(device, "present jfa ping", &[&ping.view], sampler),
                present.texture_bind_group(device, "present jfa pong", &[&pong.view], sampler),
            ],
            present_distance: present.texture_bind_group(
                device,
                "present distance",
                &[&targets.distance.view],
                sampler,
            ),
            present_radiance: present.texture_bind_group(
                device,
                "present radiance",
                &[&targets.radiance.view],
                sampler,
            ),
            seed: programs.seed.texture_bind_group(
                device,
                "seed scene",
                &[&targets.color.view, &targets.emissive.view],
                sampler,
            ),
            jfa: [
                programs
                    .jfa
                    .texture_bind_group(device, "jfa read ping", &[&ping.view], sampler),
                programs
                    .jfa
                    .texture_bind_group(device, "jfa read pong", &[&pong.view], sampler),
            ],
            distance: [
                programs.distance.texture_bind_group(
                    device,
                    "distance read ping",
                    &[&ping.view],
                    sampler,
                ),
                programs.distance.texture_bind_group(
                    device,
                    "distance read pong",
                    &[&pong.view],
                    sampler,
                ),
            ],
            trace: programs.trace.texture_bind_group(
                device,
                "path tracer inputs",
                &[
                    &targets.emissive.view,
                    &targets.distance.view,
                    &targets.blue_noise.view,
                ],
                sampler,
            ),
        }
    }
}

/// The wgpu implementation of the pipeline.
///
/// Owns every GPU resource for its lifetime: five programs over one shared
/// screen quad, the scene layers, both ping-pong targets, the distance field
/// and radiance targets, and the display target (a window surface or an
/// offscreen texture that can be read back). Nothing is created or resized
/// after construction.
pub struct Engine {
    // Declaration order is drop order; the device goes last.
    programs: ProgramSet,
    bind_groups: BindGroups,
    quad: ScreenQuad,
    targets: TargetSet,
    _sampler: wgpu::Sampler,
    display: Display,
    context: GpuContext,
    resolution: Resolution,
    params: PipelineParams,
    trace_config: TraceConfig,
    jfa_output: PingPong,
}

impl Engine {
    /// Headless engine on the default high-performance adapter.
    pub fn new(resolution: Resolution) -> Result<Self, EngineError> {
        Self::headless(resolution, GpuPowerPreference::default())
    }

    pub fn headless(
        resolution: Resolution,
        power: GpuPowerPreference,
    ) -> Result<Self, EngineError> {
        let context = GpuContext::headless(resolution, power)?;
        let display = Display::Offscreen(Target::offscreen(
            &context.device,
            resolution,
            OFFSCREEN_FORMAT,
        ));
        Self::build(context, display, OFFSCREEN_FORMAT, resolution)
    }

    /// Engine presenting into `target`. The window must outlive the engine.
    pub fn with_window<T>(
        target: &T,
        resolution: Resolution,
        power: GpuPowerPreference,
    ) -> Result<Self, EngineError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::with_window(target, resolution, power)?;
        let format = context
            .surface
            .as_ref()
            .map(|state| state.config.format)
            .unwrap_or(OFFSCREEN_FORMAT);
        Self::build(context, Display::Surface, format, resolution)
    }

    fn build(
        context: GpuContext,
        display: Display,
        display_format: wgpu::TextureFormat,
        resolution: Resolution,
    ) -> Result<Self, EngineError> {
        let device = &context.device;
        let programs = ProgramSet::new(device, display_format)?;
        let targets = TargetSet::new(device, &context.queue, resolution);
        let sampler = create_nearest_sampler(device);
        let bind_groups = BindGroups::new(device, &programs, &targets, &sampler);
        let quad = ScreenQuad::new(device);
        debug!(
            %resolution,
            ?display_format,
            adapter = %context.adapter_profile.name,
            "created render engine"
        );

        Ok(Self {
            programs,
            bind_groups,
            quad,
            targets,
            _sampler: sampler,
            display,
            context,
            resolution,
            params: PipelineParams::default(),
            trace_config: TraceConfig::default(),
            jfa_output: PingPong::A,
        })
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    pub fn trace_config(&self) -> &TraceConfig {
        &self.trace_config
    }

    pub fn set_trace_config(&mut self, config: TraceConfig) {
        self.trace_config = config;
    }

    /// Re-applies the surface configuration after the swapchain was lost or
    /// became outdated. The size never changes.
    pub fn reconfigure_surface(&self) {
        if let Some(state) = &self.context.surface {
            debug!("reconfiguring window surface");
            state.surface.configure(&self.context.device, &state.config);
        }
    }

    /// Waits for outstanding GPU work and releases every owned resource.
    ///
    /// Consumes the engine, so teardown happens exactly once. Dropping the
    /// engine releases the same resources without waiting.
    pub fn release(self) {
        if let Err(err) = self.context.device.poll(wgpu::PollType::Wait) {
            warn!(error = %err, "GPU did not go idle before release");
        }
        debug!(resolution = %self.resolution, "released render engine");
    }

    /// Nearest-seed texels `(u, v, 1, 0)` of the last propagation run.
    pub fn read_jfa_output(&self) -> Result<Vec<[f32; 4]>, EngineError> {
        self.read_float_target(&self.targets.jfa[self.jfa_output.index()])
    }

    /// `(distance, u, v, has_seed)` texels of the last distance pass.
    pub fn read_distance_field(&self) -> Result<Vec<[f32; 4]>, EngineError> {
        self.read_float_target(&self.targets.distance)
    }

    /// Linear radiance of the last path-traced frame.
    pub fn read_radiance(&self) -> Result<Vec<[f32; 4]>, EngineError> {
        self.read_float_target(&self.targets.radiance)
    }

    fn read_float_target(&self, target: &Target) -> Result<Vec<[f32; 4]>, EngineError> {
        let bytes = read_texture(
            &self.context.device,
            &self.context.queue,
            &target.texture,
            self.resolution,
            FLOAT_TEXEL_BYTES,
        )?;
        Ok(bytes
            .chunks_exact(FLOAT_TEXEL_BYTES as usize)
            .map(bytemuck::pod_read_unaligned::<[f32; 4]>)
            .collect())
    }

    /// Uploads `uniforms` through a staging copy so every pass recorded in
    /// the same encoder sees its own values, then draws the quad.
    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        program: &StageProgram,
        textures: &wgpu::BindGroup,
        target: &wgpu::TextureView,
        uniforms: &[u8],
    ) {
        let staging = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniform staging"),
                contents: uniforms,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &program.uniform_buffer,
            0,
            program.uniform_size(),
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(program.program.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &program.uniform_bind_group, &[]);
        pass.set_bind_group(1, textures, &[]);
        self.quad.draw(&mut pass);
    }

    fn encode_clear(encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    /// Seed pass into slot A followed by the offset-halving schedule.
    /// Returns the slot holding the result.
    fn encode_jfa(&self, encoder: &mut wgpu::CommandEncoder, mode: JfaMode) -> PingPong {
        let plan = PassPlan::new(mode, self.resolution);
        for target in &self.targets.jfa {
            Self::encode_clear(encoder, &target.view);
        }

        let seed = SeedUniforms::new(self.resolution);
        self.encode_pass(
            encoder,
            &self.programs.seed,
            &self.bind_groups.seed,
            &self.targets.jfa[PingPong::A.index()].view,
            bytemuck::bytes_of(&seed),
        );

        for pass in plan.passes() {
            let uniforms = JfaUniforms::new(self.resolution, pass.offset_uv(self.resolution));
            self.encode_pass(
                encoder,
                &self.programs.jfa,
                &self.bind_groups.jfa[pass.read.index()],
                &self.targets.jfa[pass.write.index()].view,
                bytemuck::bytes_of(&uniforms),
            );
        }
        trace!(passes = plan.len(), output = ?plan.output(), "encoded jump flooding");
        plan.output()
    }

    fn encode_distance(&self, encoder: &mut wgpu::CommandEncoder, jfa_output: PingPong) {
        let uniforms = DistanceUniforms::new(self.resolution);
        self.encode_pass(
            encoder,
            &self.programs.distance,
            &self.bind_groups.distance[jfa_output.index()],
            &self.targets.distance.view,
            bytemuck::bytes_of(&uniforms),
        );
    }

    fn encode_trace(&self, encoder: &mut wgpu::CommandEncoder) {
        let uniforms = TraceUniforms::new(self.resolution, &self.params, &self.trace_config);
        self.encode_pass(
            encoder,
            &self.programs.trace,
            &self.bind_groups.trace,
            &self.targets.radiance.view,
            bytemuck::bytes_of(&uniforms),
        );
    }

    fn encode_present(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let source = match self.params.stage {
            Stage::Painting => &self.bind_groups.present_color,
            Stage::Jfa => &self.bind_groups.present_jfa[self.jfa_output.index()],
            Stage::DistanceField => &self.bind_groups.present_distance,
            Stage::PathtracingGi => &self.bind_groups.present_radiance,
        };
        let uniforms = PresentUniforms::new(self.resolution, &self.params);
        self.encode_pass(
            encoder,
            &self.programs.present,
            source,
            view,
            bytemuck::bytes_of(&uniforms),
        );
    }
}

impl RenderBackend for Engine {
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
        self.targets
            .color
            .write_rgba8(&self.context.queue, self.resolution, pixels)
    }

    fn update_emissive_scene(&mut self, pixels: &[u8]) -> Result<(), EngineError> {
        self.targets
            .emissive
            .write_rgba8(&self.context.queue, self.resolution, pixels)
    }

    fn render(&mut self) -> Result<(), EngineError> {
        // Acquire the frame first; it can block on vsync.
        let frame = match (&self.display, self.context.surface.as_ref()) {
            (Display::Surface, Some(state)) => Some(state.surface.get_current_texture()?),
            _ => None,
        };

        let stage = self.params.stage;
        trace!(stage = %stage, "rendering frame");
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        match stage {
            Stage::Painting => {}
            Stage::Jfa => {
                self.jfa_output =
                    self.encode_jfa(&mut encoder, JfaMode::Capped(self.params.jfa_passes));
            }
            Stage::DistanceField => {
                self.jfa_output = self.encode_jfa(&mut encoder, JfaMode::Converged);
                self.encode_distance(&mut encoder, self.jfa_output);
            }
            Stage::PathtracingGi => {
                self.jfa_output = self.encode_jfa(&mut encoder, JfaMode::Converged);
                self.encode_distance(&mut encoder, self.jfa_output);
                self.encode_trace(&mut encoder);
            }
        }

        match (&frame, &self.display) {
            (Some(frame), _) => {
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.encode_present(&mut encoder, &view);
            }
            (None, Display::Offscreen(target)) => self.encode_present(&mut encoder, &target.view),
            (None, Display::Surface) => {
                return Err(EngineError::SurfaceCreation(
                    "engine has no configured surface".into(),
                ));
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = frame {
            frame.present();
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, EngineError> {
        match &self.display {
            Display::Offscreen(target) => {
                let pixels = read_texture(
                    &self.context.device,
                    &self.context.queue,
                    &target.texture,
                    self.resolution,
                    RGBA8_BYTES_PER_PIXEL as u32,
                )?;
                Ok(Frame {
                    resolution: self.resolution,
                    pixels,
                })
            }
            Display::Surface => Err(EngineError::ReadbackUnavailable),
        }
    }
}
