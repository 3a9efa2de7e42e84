//! GLSL programs compiled through wgpu's naga frontend.
//!
//! Every fragment program addresses texels with `texelFetch` at
//! `gl_FragCoord` (top-left origin, pixel centres at `x + 0.5`), so sampling
//! never filters. Set 0 holds the program's uniform block, set 1 its textures
//! as `texture2D`/`sampler` pairs at bindings `2i` and `2i + 1`.

use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::error::EngineError;

/// The five fragment programs of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Program {
    Present,
    Seed,
    JfaStep,
    DistanceField,
    PathTracer,
}

impl Program {
    pub const ALL: [Program; 5] = [
        Program::Present,
        Program::Seed,
        Program::JfaStep,
        Program::DistanceField,
        Program::PathTracer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Program::Present => "present",
            Program::Seed => "seed",
            Program::JfaStep => "jfa step",
            Program::DistanceField => "distance field",
            Program::PathTracer => "path tracer",
        }
    }

    pub fn fragment_source(self) -> &'static str {
        match self {
            Program::Present => PRESENT_FRAGMENT,
            Program::Seed => SEED_FRAGMENT,
            Program::JfaStep => JFA_FRAGMENT,
            Program::DistanceField => DISTANCE_FRAGMENT,
            Program::PathTracer => TRACE_FRAGMENT,
        }
    }

    /// Number of textures bound in set 1.
    pub fn texture_count(self) -> usize {
        match self {
            Program::Present => 1,
            Program::Seed => 2,
            Program::JfaStep => 1,
            Program::DistanceField => 1,
            Program::PathTracer => 3,
        }
    }
}

/// Compiles `source` and turns naga validation failures into an error
/// instead of a device-lost panic.
fn compile(
    device: &wgpu::Device,
    label: &'static str,
    source: &'static str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, EngineError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(EngineError::ShaderCompilation {
            program: label,
            message: err.to_string(),
        });
    }
    Ok(module)
}

pub(crate) fn compile_vertex_shader(
    device: &wgpu::Device,
) -> Result<wgpu::ShaderModule, EngineError> {
    compile(device, "screen quad", QUAD_VERTEX, ShaderStage::Vertex)
}

pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    program: Program,
) -> Result<wgpu::ShaderModule, EngineError> {
    compile(
        device,
        program.label(),
        program.fragment_source(),
        ShaderStage::Fragment,
    )
}

const QUAD_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

const PRESENT_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform PresentParams {
    float u_exposure;
    int u_tonemapper;
    int u_post;
    int u_view;
    float u_distance_scale;
    float _pad0;
    float _pad1;
    float _pad2;
} params;

layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

// Narkowicz fit, same constants as `tonemap::aces_filmic`.
vec3 aces_filmic(vec3 x) {
    return clamp((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14), 0.0, 1.0);
}

void main() {
    vec4 texel = texture(sampler2D(source_texture, source_sampler), v_uv);
    if (params.u_view == 0) {
        out_color = texel;
    } else if (params.u_view == 1) {
        out_color = vec4(texel.xy, 0.0, 1.0);
    } else if (params.u_view == 2) {
        float gray = texel.x * params.u_distance_scale;
        out_color = vec4(gray, gray, gray, 1.0);
    } else {
        vec3 rgb = texel.rgb;
        if (params.u_post != 0) {
            rgb = rgb * exp2(params.u_exposure);
            if (params.u_tonemapper == 1) {
                rgb = aces_filmic(rgb);
            }
        }
        out_color = vec4(rgb, 1.0);
    }
}
";

const SEED_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform SeedParams {
    vec2 u_invresolution;
    vec2 _pad;
} params;

layout(set = 1, binding = 0) uniform texture2D color_texture;
layout(set = 1, binding = 1) uniform sampler color_sampler;
layout(set = 1, binding = 2) uniform texture2D emissive_texture;
layout(set = 1, binding = 3) uniform sampler emissive_sampler;

void main() {
    ivec2 pixel = ivec2(gl_FragCoord.xy);
    float color_alpha = texelFetch(sampler2D(color_texture, color_sampler), pixel, 0).a;
    float emissive_alpha = texelFetch(sampler2D(emissive_texture, emissive_sampler), pixel, 0).a;
    if (color_alpha > 0.0 || emissive_alpha > 0.0) {
        out_color = vec4(gl_FragCoord.xy * params.u_invresolution, 1.0, 0.0);
    } else {
        out_color = vec4(0.0);
    }
}
";

// Neighbours are visited dy-major from -1 to 1 and only a strictly nearer
// candidate replaces the best, matching `cpu::passes::jfa_step`.
const JFA_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform JfaParams {
    vec2 u_resolution;
    vec2 u_offset;
} params;

layout(set = 1, binding = 0) uniform texture2D jfa_texture;
layout(set = 1, binding = 1) uniform sampler jfa_sampler;

void main() {
    ivec2 size = ivec2(params.u_resolution);
    ivec2 pixel = ivec2(gl_FragCoord.xy);
    ivec2 jump = ivec2(round(params.u_offset * params.u_resolution));

    vec4 best = vec4(0.0);
    float best_distance = 3.0e38;
    for (int dy = -1; dy <= 1; dy++) {
        for (int dx = -1; dx <= 1; dx++) {
            ivec2 neighbour = ivec2(pixel.x + dx * jump.x, pixel.y + dy * jump.y);
            if (neighbour.x < 0 || neighbour.y < 0 || neighbour.x >= size.x || neighbour.y >= size.y) {
                continue;
            }
            vec4 candidate = texelFetch(sampler2D(jfa_texture, jfa_sampler), neighbour, 0);
            if (candidate.z <= 0.0) {
                continue;
            }
            vec2 delta = candidate.xy * params.u_resolution - gl_FragCoord.xy;
            float distance_sq = delta.x * delta.x + delta.y * delta.y;
            if (distance_sq < best_distance) {
                best_distance = distance_sq;
                best = candidate;
            }
        }
    }
    out_color = best;
}
";

const DISTANCE_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform DistanceParams {
    vec2 u_resolution;
    float u_empty_distance;
    float _pad;
} params;

layout(set = 1, binding = 0) uniform texture2D jfa_texture;
layout(set = 1, binding = 1) uniform sampler jfa_sampler;

void main() {
    vec4 seed = texelFetch(sampler2D(jfa_texture, jfa_sampler), ivec2(gl_FragCoord.xy), 0);
    if (seed.z > 0.0) {
        vec2 delta = seed.xy * params.u_resolution - gl_FragCoord.xy;
        out_color = vec4(sqrt(delta.x * delta.x + delta.y * delta.y), seed.xy, 1.0);
    } else {
        out_color = vec4(params.u_empty_distance, 0.0, 0.0, 0.0);
    }
}
";

const TRACE_FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform TraceParams {
    vec2 u_resolution;
    int u_ray_count;
    int u_noise_method;
    float u_falloff;
    float u_hit_epsilon;
    int u_max_steps;
    float _pad;
    vec4 u_ambient;
} params;

layout(set = 1, binding = 0) uniform texture2D scene_texture;
layout(set = 1, binding = 1) uniform sampler scene_sampler;
layout(set = 1, binding = 2) uniform texture2D field_texture;
layout(set = 1, binding = 3) uniform sampler field_sampler;
layout(set = 1, binding = 4) uniform texture2D noise_texture;
layout(set = 1, binding = 5) uniform sampler noise_sampler;

const float TAU = 6.283185307179586;

uint pcg_hash(uint value) {
    uint state = value * 747796405u + 2891336453u;
    uint word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

float ray_jitter(ivec2 pixel, int ray) {
    if (params.u_noise_method == 1) {
        uint h = pcg_hash(uint(pixel.x) ^ pcg_hash(uint(pixel.y) ^ pcg_hash(uint(ray))));
        return float(h >> 8u) / 16777216.0;
    }
    if (params.u_noise_method == 2) {
        ivec2 tile = ivec2(pixel.x & 63, pixel.y & 63);
        return texelFetch(sampler2D(noise_texture, noise_sampler), tile, 0).r;
    }
    return 0.0;
}

vec3 march(vec2 origin, vec2 direction) {
    float travelled = 0.0;
    for (int i = 0; i < params.u_max_steps; i++) {
        vec2 position = origin + direction * travelled;
        if (position.x < 0.0 || position.y < 0.0 || position.x >= params.u_resolution.x || position.y >= params.u_resolution.y) {
            return params.u_ambient.rgb;
        }
        vec4 field = texelFetch(sampler2D(field_texture, field_sampler), ivec2(position), 0);
        if (field.w > 0.0 && field.x <= params.u_hit_epsilon) {
            ivec2 last = ivec2(params.u_resolution) - ivec2(1, 1);
            ivec2 texel = min(ivec2(floor(field.yz * params.u_resolution)), last);
            vec3 radiance = texelFetch(sampler2D(scene_texture, scene_sampler), texel, 0).rgb;
            return radiance / (1.0 + params.u_falloff * travelled);
        }
        travelled += field.x;
    }
    return vec3(0.0);
}

void main() {
    vec2 origin = gl_FragCoord.xy;
    ivec2 pixel = ivec2(origin);
    int rays = max(params.u_ray_count, 1);
    vec3 sum = vec3(0.0);
    for (int ray = 0; ray < rays; ray++) {
        float angle = TAU * (float(ray) + ray_jitter(pixel, ray)) / float(rays);
        sum += march(origin, vec2(cos(angle), sin(angle)));
    }
    out_color = vec4(sum / float(rays), 1.0);
}
";
