//! Settings file model for `rcx`.
//!
//! Every field is optional so a file only has to mention what it changes.
//! Layers are merged with [`EngineSettings::overlay`] (defaults < file < CLI)
//! and numeric values are clamped to the ranges the engine documents before
//! they become [`PipelineParams`].

use std::fmt;
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use radiance::{
    GpuPowerPreference, NoiseMethod, PipelineParams, Resolution, Stage, Tonemapper,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_TARGET_FPS: f32 = 60.0;
pub const DEFAULT_TITLE: &str = "rcx";
pub const DEFAULT_BRUSH_RADIUS: f32 = 10.0;
pub const DEFAULT_BRUSH_COLOR: [u8; 3] = [255, 255, 255];
pub const BRUSH_RADIUS_RANGE: RangeInclusive<f32> = 1.0..=30.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub brush: BrushSettings,
}

/// Engine resolution, adapter choice and the initial pipeline parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_stage_opt")]
    pub stage: Option<Stage>,
    pub jfa_passes: Option<u32>,
    pub ray_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_noise_opt")]
    pub noise: Option<NoiseMethod>,
    pub exposure: Option<f32>,
    pub post: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_tonemapper_opt")]
    pub tonemapper: Option<Tonemapper>,
    #[serde(default, deserialize_with = "deserialize_power_opt")]
    pub power: Option<GpuPowerPreference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSettings {
    pub title: Option<String>,
    /// Frame cap for the interactive loop; `0` renders as fast as vsync allows.
    pub target_fps: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrushSettings {
    pub radius: Option<f32>,
    pub color: Option<[u8; 3]>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Name(String),
    Code(i64),
}

fn deserialize_code_or_name<'de, D, T>(
    deserializer: D,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let helper: Option<CodeOrName> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(CodeOrName::Name(raw)) => parse(&raw).map(Some).map_err(de::Error::custom),
        Some(CodeOrName::Code(value)) => {
            if value < 0 {
                return Err(de::Error::custom("value must be non-negative"));
            }
            parse(&value.to_string()).map(Some).map_err(de::Error::custom)
        }
    }
}

fn deserialize_stage_opt<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_code_or_name(deserializer, parse_stage)
}

fn deserialize_noise_opt<'de, D>(deserializer: D) -> Result<Option<NoiseMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_code_or_name(deserializer, parse_noise_method)
}

fn deserialize_tonemapper_opt<'de, D>(deserializer: D) -> Result<Option<Tonemapper>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_code_or_name(deserializer, parse_tonemapper)
}

fn deserialize_power_opt<'de, D>(deserializer: D) -> Result<Option<GpuPowerPreference>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_code_or_name(deserializer, parse_power_preference)
}

/// Accepts the stage code `1`-`4` or its name.
pub fn parse_stage(raw: &str) -> Result<Stage, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "painting" | "paint" => Ok(Stage::Painting),
        "2" | "jfa" => Ok(Stage::Jfa),
        "3" | "distance-field" | "distance" | "df" => Ok(Stage::DistanceField),
        "4" | "pathtracing" | "pathtracing-gi" | "gi" => Ok(Stage::PathtracingGi),
        other => Err(format!(
            "invalid stage '{other}'; expected 1-4, painting, jfa, distance-field or pathtracing"
        )),
    }
}

/// Accepts the noise code `0`-`2` or its name.
pub fn parse_noise_method(raw: &str) -> Result<NoiseMethod, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "0" | "none" | "off" => Ok(NoiseMethod::None),
        "1" | "hash" | "pseudo-random-hash" => Ok(NoiseMethod::PseudoRandomHash),
        "2" | "blue-noise" | "blue" => Ok(NoiseMethod::BlueNoise),
        other => Err(format!(
            "invalid noise method '{other}'; expected 0-2, none, hash or blue-noise"
        )),
    }
}

pub fn parse_tonemapper(raw: &str) -> Result<Tonemapper, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "0" | "none" | "off" => Ok(Tonemapper::None),
        "1" | "aces" | "aces-filmic" => Ok(Tonemapper::AcesFilmic),
        other => Err(format!(
            "invalid tonemapper '{other}'; expected 0, 1, none or aces"
        )),
    }
}

pub fn parse_power_preference(raw: &str) -> Result<GpuPowerPreference, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        other => Err(format!(
            "invalid power preference '{other}'; expected low or high"
        )),
    }
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Like [`Settings::load`], but a missing file is not an error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Rejects values that cannot be clamped into something meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.width == Some(0) || self.engine.height == Some(0) {
            return Err(ConfigError::Invalid(
                "engine width and height must be greater than zero".into(),
            ));
        }

        if let Some(exposure) = self.engine.exposure {
            if !exposure.is_finite() {
                return Err(ConfigError::Invalid(
                    "engine.exposure must be a finite number".into(),
                ));
            }
        }

        if let Some(fps) = self.window.target_fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("window.target_fps must be >= 0".into()));
            }
        }

        if let Some(radius) = self.brush.radius {
            if !radius.is_finite() {
                return Err(ConfigError::Invalid(
                    "brush.radius must be a finite number".into(),
                ));
            }
        }

        Ok(())
    }
}

impl EngineSettings {
    /// Fields set in `other` win over fields set in `self`.
    pub fn overlay(self, other: EngineSettings) -> Self {
        Self {
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            stage: other.stage.or(self.stage),
            jfa_passes: other.jfa_passes.or(self.jfa_passes),
            ray_count: other.ray_count.or(self.ray_count),
            noise: other.noise.or(self.noise),
            exposure: other.exposure.or(self.exposure),
            post: other.post.or(self.post),
            tonemapper: other.tonemapper.or(self.tonemapper),
            power: other.power.or(self.power),
        }
    }

    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        let width = self.width.unwrap_or(DEFAULT_WIDTH);
        let height = self.height.unwrap_or(DEFAULT_HEIGHT);
        Resolution::new(width, height).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn power(&self) -> GpuPowerPreference {
        self.power.unwrap_or_default()
    }

    /// Initial parameters, clamped to the documented ranges.
    pub fn pipeline_params(&self) -> PipelineParams {
        let defaults = PipelineParams::default();
        clamp_params(PipelineParams {
            stage: self.stage.unwrap_or(defaults.stage),
            jfa_passes: self.jfa_passes.unwrap_or(defaults.jfa_passes),
            ray_count: self.ray_count.unwrap_or(defaults.ray_count),
            noise_method: self.noise.unwrap_or(defaults.noise_method),
            exposure: self.exposure.unwrap_or(defaults.exposure),
            enable_post: self.post.unwrap_or(defaults.enable_post),
            tonemapper: self.tonemapper.unwrap_or(defaults.tonemapper),
        })
    }
}

/// Clamps every numeric parameter, logging each value that had to move.
pub fn clamp_params(params: PipelineParams) -> PipelineParams {
    let clamped = params.clamped();
    warn_if_clamped("jfa_passes", params.jfa_passes, clamped.jfa_passes);
    warn_if_clamped("ray_count", params.ray_count, clamped.ray_count);
    warn_if_clamped("exposure", params.exposure, clamped.exposure);
    clamped
}

fn warn_if_clamped<T: PartialEq + fmt::Display>(name: &str, requested: T, using: T) {
    if requested != using {
        warn!(%requested, %using, "{name} out of range; clamping");
    }
}

impl WindowSettings {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps.unwrap_or(DEFAULT_TARGET_FPS)
    }
}

impl BrushSettings {
    pub fn radius(&self) -> f32 {
        let requested = self.radius.unwrap_or(DEFAULT_BRUSH_RADIUS);
        let radius = clamp_brush_radius(requested);
        warn_if_clamped("brush.radius", requested, radius);
        radius
    }

    pub fn color(&self) -> [u8; 3] {
        self.color.unwrap_or(DEFAULT_BRUSH_COLOR)
    }
}

pub fn clamp_brush_radius(radius: f32) -> f32 {
    radius.clamp(*BRUSH_RADIUS_RANGE.start(), *BRUSH_RADIUS_RANGE.end())
}
