//! Keyboard controls for the interactive window.

use radiance::{PipelineParams, Stage, Tonemapper};
use settings::clamp_brush_radius;
use tracing::info;
use winit::keyboard::{Key, NamedKey};

const RAY_STEP: i64 = 4;
const EXPOSURE_STEP: f32 = 0.25;
const BRUSH_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SetStage(Stage),
    AdjustJfaPasses(i64),
    AdjustRayCount(i64),
    CycleNoise,
    ToggleTonemapper,
    TogglePost,
    AdjustExposure(f32),
    AdjustBrushRadius(f32),
    ClearCanvas,
    Quit,
}

pub fn action_for_key(key: &Key) -> Option<Action> {
    match key {
        Key::Named(NamedKey::Escape) => Some(Action::Quit),
        Key::Named(NamedKey::ArrowUp) => Some(Action::AdjustJfaPasses(1)),
        Key::Named(NamedKey::ArrowDown) => Some(Action::AdjustJfaPasses(-1)),
        Key::Character(value) => match value.to_ascii_lowercase().as_str() {
            "1" => Some(Action::SetStage(Stage::Painting)),
            "2" => Some(Action::SetStage(Stage::Jfa)),
            "3" => Some(Action::SetStage(Stage::DistanceField)),
            "4" => Some(Action::SetStage(Stage::PathtracingGi)),
            "]" => Some(Action::AdjustRayCount(RAY_STEP)),
            "[" => Some(Action::AdjustRayCount(-RAY_STEP)),
            "n" => Some(Action::CycleNoise),
            "t" => Some(Action::ToggleTonemapper),
            "p" => Some(Action::TogglePost),
            "=" | "+" => Some(Action::AdjustExposure(EXPOSURE_STEP)),
            "-" | "_" => Some(Action::AdjustExposure(-EXPOSURE_STEP)),
            "." => Some(Action::AdjustBrushRadius(BRUSH_STEP)),
            "," => Some(Action::AdjustBrushRadius(-BRUSH_STEP)),
            "c" => Some(Action::ClearCanvas),
            _ => None,
        },
        _ => None,
    }
}

/// Applies a parameter action, keeping every value inside its range.
/// Canvas and quit actions are left to the caller.
pub fn apply(action: Action, params: &mut PipelineParams, brush_radius: &mut f32) {
    match action {
        Action::SetStage(stage) => {
            params.stage = stage;
            info!(%stage, "stage changed");
        }
        Action::AdjustJfaPasses(delta) => {
            params.jfa_passes = step(params.jfa_passes, delta);
            *params = params.clamped();
            info!(jfa_passes = params.jfa_passes, "jfa passes changed");
        }
        Action::AdjustRayCount(delta) => {
            params.ray_count = step(params.ray_count, delta);
            *params = params.clamped();
            info!(ray_count = params.ray_count, "ray count changed");
        }
        Action::CycleNoise => {
            params.noise_method = params.noise_method.next();
            info!(noise = %params.noise_method, "noise method changed");
        }
        Action::ToggleTonemapper => {
            params.tonemapper = match params.tonemapper {
                Tonemapper::None => Tonemapper::AcesFilmic,
                Tonemapper::AcesFilmic => Tonemapper::None,
            };
            info!(tonemapper = %params.tonemapper, "tonemapper changed");
        }
        Action::TogglePost => {
            params.enable_post = !params.enable_post;
            info!(enable_post = params.enable_post, "post-processing toggled");
        }
        Action::AdjustExposure(delta) => {
            params.exposure += delta;
            *params = params.clamped();
            info!(exposure = params.exposure, "exposure changed");
        }
        Action::AdjustBrushRadius(delta) => {
            *brush_radius = clamp_brush_radius(*brush_radius + delta);
            info!(brush_radius = *brush_radius, "brush radius changed");
        }
        Action::ClearCanvas | Action::Quit => {}
    }
}

fn step(value: u32, delta: i64) -> u32 {
    (i64::from(value) + delta).clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiance::NoiseMethod;

    #[test]
    fn maps_keys_to_actions() {
        assert_eq!(
            action_for_key(&Key::Character("4".into())),
            Some(Action::SetStage(Stage::PathtracingGi))
        );
        assert_eq!(
            action_for_key(&Key::Character("N".into())),
            Some(Action::CycleNoise)
        );
        assert_eq!(
            action_for_key(&Key::Named(NamedKey::ArrowDown)),
            Some(Action::AdjustJfaPasses(-1))
        );
        assert_eq!(action_for_key(&Key::Named(NamedKey::Escape)), Some(Action::Quit));
        assert_eq!(action_for_key(&Key::Character("q".into())), None);
    }

    #[test]
    fn adjustments_stay_in_range() {
        let mut params = PipelineParams::default();
        let mut radius = 10.0;

        apply(Action::AdjustJfaPasses(-1), &mut params, &mut radius);
        assert_eq!(params.jfa_passes, 1);
        for _ in 0..20 {
            apply(Action::AdjustJfaPasses(1), &mut params, &mut radius);
        }
        assert_eq!(params.jfa_passes, 12);

        apply(Action::AdjustRayCount(-RAY_STEP * 10), &mut params, &mut radius);
        assert_eq!(params.ray_count, 4);
        apply(Action::AdjustRayCount(RAY_STEP * 100), &mut params, &mut radius);
        assert_eq!(params.ray_count, 80);

        for _ in 0..40 {
            apply(Action::AdjustExposure(EXPOSURE_STEP), &mut params, &mut radius);
        }
        assert_eq!(params.exposure, 5.0);

        apply(Action::AdjustBrushRadius(-50.0), &mut params, &mut radius);
        assert_eq!(radius, 1.0);
    }

    #[test]
    fn toggles_and_cycles() {
        let mut params = PipelineParams::default();
        let mut radius = 10.0;

        apply(Action::CycleNoise, &mut params, &mut radius);
        assert_eq!(params.noise_method, NoiseMethod::PseudoRandomHash);
        apply(Action::ToggleTonemapper, &mut params, &mut radius);
        assert_eq!(params.tonemapper, Tonemapper::None);
        apply(Action::TogglePost, &mut params, &mut radius);
        assert!(!params.enable_post);
        apply(Action::SetStage(Stage::Jfa), &mut params, &mut radius);
        assert_eq!(params.stage, Stage::Jfa);
    }
}
