//! Interactive painting window.
//!
//! Left button paints with the brush color, right button paints opaque black
//! occluders, middle button paints a hue-cycling light. The canvas is uploaded
//! as the scene and a frame rendered on every redraw.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use radiance::gpu::SurfaceError;
use radiance::{Engine, EngineError, PipelineParams, RenderBackend};
use settings::Settings;
use tracing::{error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::controls::{self, Action};
use crate::paint::{Canvas, HueCycle, Point};

const SOFTWARE_FPS_CAP: f32 = 15.0;
const STATS_INTERVAL: u64 = 60;
const OCCLUDER: [u8; 4] = [0, 0, 0, 255];

pub fn run_window(settings: &Settings) -> Result<()> {
    let resolution = settings.engine.resolution()?;
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(settings.window.title())
        .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
        .with_resizable(false)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;

    let mut engine = Engine::with_window(&window, resolution, settings.engine.power())
        .context("failed to initialise window renderer")?;
    engine.set_params(settings.engine.pipeline_params());

    let profile = engine.adapter_profile();
    let mut target_fps = settings.window.target_fps();
    if profile.is_software() && settings.window.target_fps.is_none() {
        target_fps = SOFTWARE_FPS_CAP;
        warn!(
            adapter = %profile.name,
            backend = ?profile.backend,
            cap = SOFTWARE_FPS_CAP,
            "software rasterizer detected; capping frame rate (override with window.target_fps)"
        );
    }
    info!(
        %resolution,
        adapter = %profile.name,
        target_fps,
        "opened interactive window"
    );

    let mut app = WindowApp {
        engine,
        canvas: Canvas::new(resolution),
        brush: Brush {
            radius: settings.brush.radius(),
            color: {
                let [r, g, b] = settings.brush.color();
                [r, g, b, 255]
            },
            hue: HueCycle::default(),
        },
        mouse: MouseState::default(),
        pacer: FramePacer::new(target_fps),
        stats: FrameStats::new(Instant::now()),
        title: settings.window.title().to_string(),
        window,
    };

    let mut failure = None;
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == app.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let Some(action) = controls::action_for_key(&event.logical_key) else {
                    return;
                };
                if event.repeat && !is_repeatable(action) {
                    return;
                }
                match action {
                    Action::Quit => elwt.exit(),
                    Action::ClearCanvas => {
                        app.canvas.clear();
                        info!("canvas cleared");
                    }
                    other => controls::apply(
                        other,
                        app.engine.params_mut(),
                        &mut app.brush.radius,
                    ),
                }
            }
            WindowEvent::CursorMoved { position, .. } => app.mouse.position = Some(position),
            WindowEvent::MouseInput { state, button, .. } => {
                app.mouse.handle_button(button, state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = app.redraw() {
                    error!("{err:#}");
                    failure = Some(err);
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            match app.pacer.next_deadline(now) {
                None => {
                    app.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Poll);
                }
                Some(deadline) if deadline <= now => {
                    app.window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
                Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
            }
        }
        _ => {}
    });

    let WindowApp { engine, window, .. } = app;
    engine.release();
    drop(window);

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn is_repeatable(action: Action) -> bool {
    matches!(
        action,
        Action::AdjustJfaPasses(_)
            | Action::AdjustRayCount(_)
            | Action::AdjustExposure(_)
            | Action::AdjustBrushRadius(_)
    )
}

struct WindowApp {
    // Declared before `window`: the surface must go first.
    engine: Engine,
    canvas: Canvas,
    brush: Brush,
    mouse: MouseState,
    pacer: FramePacer,
    stats: FrameStats,
    title: String,
    window: Window,
}

struct Brush {
    radius: f32,
    color: [u8; 4],
    hue: HueCycle,
}

impl WindowApp {
    fn redraw(&mut self) -> Result<()> {
        self.paint();

        let started = Instant::now();
        self.engine.update_scene_texture(self.canvas.pixels())?;
        match self.engine.render() {
            Ok(()) => {}
            Err(EngineError::Surface(err @ (SurfaceError::Lost | SurfaceError::Outdated))) => {
                warn!(error = %err, "surface needs reconfiguring; skipping frame");
                self.engine.reconfigure_surface();
                return Ok(());
            }
            Err(EngineError::Surface(SurfaceError::Timeout)) => {
                warn!("surface timeout; retrying next frame");
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to render frame"),
        }
        let render_time = started.elapsed();
        self.pacer.mark_rendered(started);

        if let Some(report) = self.stats.record(Instant::now(), render_time) {
            let params: &PipelineParams = self.engine.params();
            info!(
                fps = report.fps,
                render_ms = report.render_ms,
                stage = %params.stage,
                "frame stats"
            );
            self.window.set_title(&format!(
                "{}  -  {}fps  render time: {:.2}ms",
                self.title,
                report.fps.round(),
                report.render_ms
            ));
        }
        Ok(())
    }

    fn paint(&mut self) {
        let Some(position) = self.mouse.position else {
            return;
        };
        let current: Point = [position.x as f32, position.y as f32];
        let last = self.mouse.last.replace(current).unwrap_or(current);

        let color = if self.mouse.left {
            self.brush.color
        } else if self.mouse.right {
            OCCLUDER
        } else if self.mouse.middle {
            self.brush.hue.next_color()
        } else {
            return;
        };
        self.canvas
            .stroke(last, current, self.brush.radius * 0.5, color);
    }
}

#[derive(Default)]
struct MouseState {
    position: Option<PhysicalPosition<f64>>,
    last: Option<Point>,
    left: bool,
    right: bool,
    middle: bool,
}

impl MouseState {
    fn handle_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.left = pressed,
            MouseButton::Right => self.right = pressed,
            MouseButton::Middle => self.middle = pressed,
            _ => {}
        }
    }
}

/// Spaces redraws `1 / target_fps` apart; a zero target never waits.
struct FramePacer {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
}

impl FramePacer {
    fn new(target_fps: f32) -> Self {
        let interval =
            (target_fps > 0.0).then(|| Duration::from_secs_f64(1.0 / f64::from(target_fps)));
        Self {
            interval,
            last_frame: None,
        }
    }

    /// `None` when frames are uncapped.
    fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let interval = self.interval?;
        Some(self.last_frame.map_or(now, |last| last + interval))
    }

    fn mark_rendered(&mut self, at: Instant) {
        self.last_frame = Some(at);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StatsReport {
    fps: f64,
    render_ms: f64,
}

struct FrameStats {
    frames: u64,
    window_start: Instant,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
        }
    }

    fn record(&mut self, now: Instant, render_time: Duration) -> Option<StatsReport> {
        self.frames += 1;
        if self.frames % STATS_INTERVAL != 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        self.window_start = now;
        let fps = if elapsed > 0.0 {
            STATS_INTERVAL as f64 / elapsed
        } else {
            0.0
        };
        Some(StatsReport {
            fps,
            render_ms: render_time.as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_report_every_interval() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        let frame = Duration::from_millis(10);
        for index in 1..STATS_INTERVAL {
            assert!(stats
                .record(start + frame * index as u32, frame)
                .is_none());
        }
        let report = stats
            .record(start + Duration::from_millis(600), Duration::from_millis(4))
            .unwrap();
        assert!((report.fps - 100.0).abs() < 1e-6);
        assert!((report.render_ms - 4.0).abs() < 1e-9);
        assert!(stats.record(start + Duration::from_secs(1), frame).is_none());
    }

    #[test]
    fn pacer_spaces_frames() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50.0);
        assert_eq!(pacer.next_deadline(start), Some(start));
        pacer.mark_rendered(start);
        assert_eq!(
            pacer.next_deadline(start),
            Some(start + Duration::from_millis(20))
        );
        assert_eq!(FramePacer::new(0.0).next_deadline(start), None);
    }

    #[test]
    fn only_adjustments_repeat() {
        assert!(is_repeatable(Action::AdjustExposure(0.25)));
        assert!(!is_repeatable(Action::TogglePost));
        assert!(!is_repeatable(Action::Quit));
    }

    #[test]
    fn first_buttons_win() {
        let mut mouse = MouseState::default();
        mouse.handle_button(MouseButton::Right, true);
        mouse.handle_button(MouseButton::Middle, true);
        assert!(mouse.right && mouse.middle && !mouse.left);
        mouse.handle_button(MouseButton::Right, false);
        assert!(!mouse.right);
    }
}
