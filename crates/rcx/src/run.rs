use std::path::Path;

use anyhow::{Context, Result};
use radiance::{probe_adapter, GpuPowerPreference};
use settings::{EngineSettings, Settings};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, EngineArgs};
use crate::export;
use crate::paths::AppPaths;
use crate::window;

pub fn run(cli: Cli) -> Result<()> {
    let file = load_settings(cli.config.as_deref())?;
    let settings = Settings {
        engine: file.engine.clone().overlay(engine_overrides(&cli.engine)),
        ..file
    };
    debug!(engine = ?settings.engine, "resolved engine settings");

    match cli.command.unwrap_or(Command::Window) {
        Command::Window => window::run_window(&settings),
        Command::Render(args) => export::run_render(args, &settings.engine),
        Command::Adapter => print_adapter(settings.engine.power()),
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config` must exist; the default location is optional.
fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        let settings = Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        debug!(path = %path.display(), "loaded settings");
        return Ok(settings);
    }

    let paths = AppPaths::discover()?;
    let path = paths.settings_file();
    match Settings::load_optional(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?
    {
        Some(settings) => {
            debug!(path = %path.display(), "loaded settings");
            Ok(settings)
        }
        None => {
            debug!(path = %path.display(), "no settings file; using defaults");
            Ok(Settings::default())
        }
    }
}

/// CLI flags as the topmost settings layer.
fn engine_overrides(args: &EngineArgs) -> EngineSettings {
    EngineSettings {
        width: args.size.map(|size| size.width()),
        height: args.size.map(|size| size.height()),
        stage: args.stage,
        jfa_passes: args.jfa_passes,
        ray_count: args.ray_count,
        noise: args.noise,
        exposure: args.exposure,
        post: args.no_post.then_some(false),
        tonemapper: args.tonemapper,
        power: args.power,
    }
}

fn print_adapter(power: GpuPowerPreference) -> Result<()> {
    let profile = probe_adapter(power).context("failed to query GPU adapter")?;
    if profile.is_software() {
        warn!(
            adapter = %profile.name,
            "only a software rasterizer is available; rendering will be slow"
        );
    }
    println!("adapter:      {}", profile.name);
    println!("backend:      {:?}", profile.backend);
    println!("device type:  {:?}", profile.device_type);
    println!("driver:       {}", profile.driver);
    println!("max texture:  {}", profile.max_texture_dimension);
    Ok(())
}
