use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::EngineError;
use crate::types::{GpuPowerPreference, Resolution};

/// Format of every intermediate float target (seed UVs, distances, radiance).
pub(crate) const FLOAT_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Summary of the adapter the engine runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub driver: String,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            driver: driver_label(&info.driver, &info.driver_info),
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// CPU rasterizers such as llvmpipe or WARP.
    pub fn is_software(&self) -> bool {
        self.device_type == wgpu::DeviceType::Cpu
    }
}

fn driver_label(driver: &str, driver_info: &str) -> String {
    if driver_info.is_empty() {
        driver.to_string()
    } else {
        format!("{driver} ({driver_info})")
    }
}

pub(crate) struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_profile: AdapterProfile,
    pub surface: Option<SurfaceState>,
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn power_preference(preference: GpuPowerPreference) -> wgpu::PowerPreference {
    match preference {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    }
}

impl GpuContext {
    /// Device without a presentation surface, for offscreen rendering.
    pub(crate) fn headless(
        resolution: Resolution,
        power: GpuPowerPreference,
    ) -> Result<Self, EngineError> {
        let instance = create_instance();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power_preference(power),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| EngineError::Adapter(err.to_string()))?;

        let (device, queue, adapter_profile) = open_device(&adapter, resolution)?;
        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_profile,
            surface: None,
        })
    }

    /// Device presenting into `target`, configured once at `resolution`.
    pub(crate) fn with_window<T>(
        target: &T,
        resolution: Resolution,
        power: GpuPowerPreference,
    ) -> Result<Self, EngineError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| EngineError::WindowHandle(err.to_string()))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| EngineError::WindowHandle(err.to_string()))?;

        // The caller keeps the window alive for as long as the engine exists.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| EngineError::SurfaceCreation(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power_preference(power),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| EngineError::Adapter(err.to_string()))?;

        let (device, queue, adapter_profile) = open_device(&adapter, resolution)?;

        let caps = surface.get_capabilities(&adapter);
        // Shaders write display values directly, so avoid an sRGB re-encode.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                EngineError::SurfaceCreation("surface reports no supported formats".into())
            })?;
        if format.is_srgb() {
            tracing::warn!(
                ?format,
                "no linear (non-sRGB) surface format available; output will be gamma encoded twice"
            );
        }

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(wgpu::PresentMode::AutoVsync);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?format, ?present_mode, "configuring window surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: resolution.width(),
            height: resolution.height(),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_profile,
            surface: Some(SurfaceState { surface, config }),
        })
    }
}

fn open_device(
    adapter: &wgpu::Adapter,
    resolution: Resolution,
) -> Result<(wgpu::Device, wgpu::Queue, AdapterProfile), EngineError> {
    let limits = adapter.limits();
    let adapter_profile = AdapterProfile::from_wgpu(&adapter.get_info(), &limits);
    tracing::debug!(
        name = %adapter_profile.name,
        backend = ?adapter_profile.backend,
        device_type = ?adapter_profile.device_type,
        is_software = adapter_profile.is_software(),
        "selected GPU adapter"
    );

    let max = limits.max_texture_dimension_2d;
    if resolution.width() > max || resolution.height() > max {
        return Err(EngineError::UnsupportedResolution {
            max,
            width: resolution.width(),
            height: resolution.height(),
        });
    }

    let float_features = adapter.get_texture_format_features(FLOAT_TARGET_FORMAT);
    if !float_features
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
    {
        return Err(EngineError::UnsupportedFormat(FLOAT_TARGET_FORMAT));
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("radiance device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits.clone(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .map_err(|err| EngineError::Device(err.to_string()))?;

    Ok((device, queue, adapter_profile))
}

/// Adapter that a headless engine would pick, without opening a device.
pub fn probe_adapter(power: GpuPowerPreference) -> Result<AdapterProfile, EngineError> {
    let instance = create_instance();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: power_preference(power),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_err(|err| EngineError::Adapter(err.to_string()))?;
    Ok(AdapterProfile::from_wgpu(&adapter.get_info(), &adapter.limits()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(device_type: wgpu::DeviceType) -> AdapterProfile {
        AdapterProfile {
            name: "test adapter".into(),
            backend: wgpu::Backend::Vulkan,
            device_type,
            driver: driver_label("testdrv", ""),
            max_texture_dimension: 8192,
        }
    }

    #[test]
    fn cpu_adapters_are_software() {
        assert!(profile(wgpu::DeviceType::Cpu).is_software());
        assert!(!profile(wgpu::DeviceType::DiscreteGpu).is_software());
        assert!(!profile(wgpu::DeviceType::IntegratedGpu).is_software());
    }

    #[test]
    fn driver_label_appends_info_when_present() {
        assert_eq!(driver_label("testdrv", ""), "testdrv");
        assert_eq!(driver_label("testdrv", "1.2"), "testdrv (1.2)");
    }
}
