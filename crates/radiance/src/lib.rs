//! 2D global illumination by screen-space path tracing.
//!
//! A frame runs up to four stages, each one a full-screen pass chain:
//!
//! ```text
//!   color + emissive layers (RGBA8)
//!          │ seed pass
//!          ▼
//!   ping-pong A ◀──▶ B   jump flooding, offsets 2^(P-1) .. 1
//!          │
//!          ▼
//!   distance field (distance, seed u, seed v, has_seed)
//!          │ sphere tracing, N rays per pixel
//!          ▼
//!   radiance ──▶ present (exposure, ACES) ──▶ surface / offscreen
//! ```
//!
//! [`gpu::Engine`] runs the chain on wgpu. [`cpu::CpuEngine`] runs the same
//! chain on host memory and is the reference the GPU output is checked
//! against. Both implement [`RenderBackend`].

pub mod backend;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod jfa;
pub mod noise;
pub mod tonemap;
pub mod types;

pub use backend::{Frame, RenderBackend};
pub use cpu::CpuEngine;
pub use error::EngineError;
pub use gpu::{probe_adapter, AdapterProfile, Engine};
pub use jfa::{full_convergence_passes, JfaMode};
pub use types::{
    DisplayView, GpuPowerPreference, NoiseMethod, PipelineParams, Resolution, Stage,
    Tonemapper, TraceConfig, EXPOSURE_RANGE, JFA_PASS_RANGE, RAY_COUNT_RANGE,
};
