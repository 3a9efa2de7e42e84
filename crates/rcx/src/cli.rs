use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use radiance::{GpuPowerPreference, NoiseMethod, Resolution, Stage, Tonemapper};
use settings::{parse_noise_method, parse_power_preference, parse_stage, parse_tonemapper};

#[derive(Parser, Debug)]
#[command(
    name = "rcx",
    author,
    version,
    about = "2D global illumination sandbox: paint lights, watch them bounce",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Settings file; defaults to `settings.toml` in the user config directory.
    #[arg(long, global = true, env = "RCX_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Engine overrides, applied on top of the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Render resolution (e.g. `1280x720`).
    #[arg(long, global = true, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<Resolution>,

    /// Stage to display: 1-4, `painting`, `jfa`, `distance-field` or `pathtracing`.
    #[arg(long, global = true, value_name = "STAGE", value_parser = parse_stage)]
    pub stage: Option<Stage>,

    /// Jump flooding passes shown by the JFA stage (1-12).
    #[arg(long, global = true, value_name = "PASSES")]
    pub jfa_passes: Option<u32>,

    /// Rays traced per pixel (4-80).
    #[arg(long = "rays", global = true, value_name = "COUNT")]
    pub ray_count: Option<u32>,

    /// Ray jitter: `none`, `hash` or `blue-noise`.
    #[arg(long, global = true, value_name = "METHOD", value_parser = parse_noise_method)]
    pub noise: Option<NoiseMethod>,

    /// Exposure in stops (-5 to 5).
    #[arg(long, global = true, value_name = "STOPS", allow_negative_numbers = true)]
    pub exposure: Option<f32>,

    /// Tonemapper: `none` or `aces`.
    #[arg(long, global = true, value_name = "CURVE", value_parser = parse_tonemapper)]
    pub tonemapper: Option<Tonemapper>,

    /// Disable exposure and tonemapping.
    #[arg(long, global = true)]
    pub no_post: bool,

    /// Adapter preference: `low` or `high`.
    #[arg(long, global = true, value_name = "PREFERENCE", value_parser = parse_power_preference)]
    pub power: Option<GpuPowerPreference>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the interactive painting window (the default).
    Window,
    /// Render a single frame without a window and write it as PNG.
    Render(RenderArgs),
    /// Print the adapter a headless engine would run on.
    Adapter,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Backend to render with.
    #[arg(long, value_enum, default_value_t = Backend::Gpu)]
    pub backend: Backend,

    /// PNG used as both the color and the emissive layer.
    #[arg(long, value_name = "PNG", conflicts_with_all = ["color", "emissive", "disk"])]
    pub scene: Option<PathBuf>,

    /// PNG for the color layer (needs `--emissive`).
    #[arg(long, value_name = "PNG", requires = "emissive", conflicts_with = "disk")]
    pub color: Option<PathBuf>,

    /// PNG for the emissive layer (needs `--color`).
    #[arg(long, value_name = "PNG", requires = "color", conflicts_with = "disk")]
    pub emissive: Option<PathBuf>,

    /// Radius in pixels of a white disk at the image center. Used when no
    /// scene file is given.
    #[arg(long, value_name = "RADIUS")]
    pub disk: Option<f32>,

    /// Where to write the rendered frame.
    #[arg(long, short, value_name = "PNG", value_parser = parse_output_path)]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Gpu,
    Cpu,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<Resolution, String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    Resolution::new(width, height).map_err(|err| err.to_string())
}

pub fn parse_output_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    check_png_extension(&path)?;
    Ok(path)
}

fn check_png_extension(path: &Path) -> Result<(), String> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Ok(()),
        None => Err("output path has no extension; expected .png".to_string()),
        Some(other) => Err(format!("unsupported output format '.{other}'; expected .png")),
    }
}
