//! wgpu backend.
//!
//! Every stage is a full-screen fragment program drawn over one shared quad:
//! - `context` opens the instance, adapter and device, and configures the
//!   window surface when there is one.
//! - `shaders` holds the GLSL sources and compiles them inside a validation
//!   error scope so bad shaders surface as `EngineError` instead of a panic.
//! - `pipeline` turns each program into a render pipeline with its uniform
//!   block in set 0 and its sampled textures in set 1.
//! - `uniforms` mirrors the std140 uniform blocks of each program.
//! - `resources` allocates the screen quad, scene layers, ping-pong targets,
//!   distance field, radiance and blue-noise textures.
//! - `readback` copies textures back to host memory.
//! - `engine` records the pass chain for a frame and exposes [`Engine`].

mod context;
mod engine;
mod pipeline;
mod readback;
mod resources;
mod shaders;
mod uniforms;

pub use context::{probe_adapter, AdapterProfile};
pub use engine::Engine;
pub use wgpu::SurfaceError;
