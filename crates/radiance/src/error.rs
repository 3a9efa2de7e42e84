use thiserror::Error;

/// Failures raised while constructing or driving an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("resolution must be non-zero, got {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
    #[error("scene buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("invalid value `{value}` for {name}")]
    InvalidParameter { name: &'static str, value: String },
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to acquire window handle: {0}")]
    WindowHandle(String),
    #[error("failed to create rendering surface: {0}")]
    SurfaceCreation(String),
    #[error("GPU max texture dimension is {max}, requested {width}x{height}")]
    UnsupportedResolution { max: u32, width: u32, height: u32 },
    #[error("texture format {0:?} cannot be used as a render target on this adapter")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("failed to compile {program} program: {message}")]
    ShaderCompilation {
        program: &'static str,
        message: String,
    },
    #[error("failed to acquire surface frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("frame readback failed: {0}")]
    Readback(String),
    #[error("engine renders to a window surface; frames cannot be read back")]
    ReadbackUnavailable,
}
