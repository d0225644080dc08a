// =============================================================================
// APPLICATION RUNNER
// =============================================================================
//
// Every sample is an `Application`; `run` owns the window, the event loop and
// the graphics device and calls back into the sample.
//
// FRAME FLOW:
// 1. Window event loop asks for a redraw
// 2. Sample `update` (CPU side, may rebuild GPU objects)
// 3. GraphicsDevice::render_frame -> sample `draw` records commands
// 4. FPS counter updates the window title once a second
//
// =============================================================================

use crate::backend::{Frame, GraphicsDevice};
use crate::config::Config;
use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

pub trait Application {
    /// Used as window title and Vulkan application name
    fn name(&self) -> &str;

    /// Create GPU resources once the device exists
    fn initialize(&mut self, graphics: &GraphicsDevice) -> Result<()>;

    /// Called before each frame
    fn update(&mut self, _graphics: &GraphicsDevice) -> Result<()> {
        Ok(())
    }

    /// Record the frame into `frame.command_buffer`, which is already begun
    fn draw(&mut self, device: &ash::Device, frame: &Frame) -> Result<()>;

    /// Release GPU resources; the device is idle when this is called
    fn destroy(&mut self, graphics: &GraphicsDevice);
}

// =============================================================================
// ENTRY POINT
// =============================================================================

pub fn run<A: Application>(app: A) -> Result<()> {
    let loaded = Config::load();

    init_logging(&loaded.config)?;
    loaded.report();
    let config = loaded.config;

    log::info!("Starting {}", app.name());
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let event_loop = EventLoop::new()?;
    let mut runner = Runner::new(config, app);
    event_loop.run_app(&mut runner)?;
    runner.shutdown();

    match runner.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging, sending output to the configured file when enabled
fn init_logging(config: &Config) -> Result<()> {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();

    if config.debug.log_to_file {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
            .with_context(|| format!("Failed to open log file {}", config.debug.log_file))?;

        writeln!(file, "=== vkbridge log ===")?;
        writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
        writeln!(file)?;

        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Logger already initialized")
}

// =============================================================================
// FPS TRACKING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub fps: f32,
    pub frame_time_ms: f32,
}

pub struct FpsCounter {
    frame_count: u32,
    last_update: Instant,
    last_frame: Instant,
}

impl FpsCounter {
    const INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_update: now,
            last_frame: now,
        }
    }

    /// Count a rendered frame; yields stats once per interval
    pub fn tick(&mut self, now: Instant) -> Option<FrameStats> {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_update);
        if elapsed < Self::INTERVAL {
            return None;
        }

        let stats = FrameStats {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_time_ms: frame_time * 1000.0,
        };
        self.frame_count = 0;
        self.last_update = now;
        Some(stats)
    }
}

pub fn format_title(name: &str, stats: FrameStats, fullscreen: bool) -> String {
    let mode = if fullscreen { "fullscreen" } else { "windowed" };
    format!(
        "{} - {:.0} FPS ({:.2}ms) [{}]",
        name, stats.fps, stats.frame_time_ms, mode
    )
}

/// Run `initialize`; if it fails, run `destroy` against the same target so
/// whatever was created before the failure is released while it is still valid.
fn initialize_or_unwind<S, T>(
    state: &mut S,
    target: &T,
    initialize: impl FnOnce(&mut S, &T) -> Result<()>,
    destroy: impl FnOnce(&mut S, &T),
) -> Result<()> {
    let result = initialize(state, target);
    if result.is_err() {
        destroy(state, target);
    }
    result
}

// =============================================================================
// RUNNER STATE
// =============================================================================

/// Field order matters for Drop: graphics goes before the window it presents to
struct Runner<A: Application> {
    app: A,
    graphics: Option<GraphicsDevice>,
    window: Option<Arc<Window>>,

    config: Config,
    title: String,
    quit_key: KeyCode,
    fullscreen_key: KeyCode,
    is_fullscreen: bool,

    fps: FpsCounter,
    error: Option<anyhow::Error>,
}

impl<A: Application> Runner<A> {
    fn new(config: Config, app: A) -> Self {
        let title = config.title(app.name()).to_string();
        Self {
            quit_key: config.controls.quit_key_code(),
            fullscreen_key: config.controls.fullscreen_key_code(),
            is_fullscreen: config.window.fullscreen,
            title,
            config,
            app,
            graphics: None,
            window: None,
            fps: FpsCounter::new(Instant::now()),
            error: None,
        }
    }

    fn init_graphics(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();
        let size = window.inner_size();

        let graphics = unsafe {
            GraphicsDevice::new(
                self.app.name(),
                &self.config,
                display,
                handle,
                size.width,
                size.height,
            )?
        };

        initialize_or_unwind(&mut self.app, &graphics, A::initialize, A::destroy)
            .with_context(|| format!("Failed to initialize {}", self.app.name()))?;
        self.graphics = Some(graphics);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(graphics) = self.graphics.as_mut() else {
            return Ok(());
        };

        self.app.update(graphics)?;

        let app = &mut self.app;
        let rendered = graphics.render_frame(|device, frame| app.draw(device, frame))?;

        if rendered && self.config.debug.show_fps {
            if let (Some(stats), Some(window)) = (self.fps.tick(Instant::now()), &self.window) {
                window.set_title(&format_title(&self.title, stats, self.is_fullscreen));
            }
        }
        Ok(())
    }

    fn toggle_fullscreen(&mut self) {
        let Some(ref window) = self.window else {
            return;
        };

        self.is_fullscreen = !self.is_fullscreen;
        if self.is_fullscreen {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            log::info!("Entered fullscreen mode");
        } else {
            window.set_fullscreen(None);
            log::info!("Exited fullscreen mode");
        }
        // Resized event follows and rebuilds the swapchain
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Let the sample release its resources while the device is still alive
    fn shutdown(&mut self) {
        if let Some(graphics) = self.graphics.take() {
            if let Err(e) = graphics.wait_idle() {
                log::warn!("wait_idle during shutdown failed: {:#}", e);
            }
            self.app.destroy(&graphics);
            drop(graphics);
            log::info!("Cleanup complete");
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl<A: Application> ApplicationHandler for Runner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        if let Err(e) = self.init_graphics(&window) {
            self.fail(event_loop, e);
            return;
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(ref mut graphics) = self.graphics {
                    graphics.resize(size.width, size.height);
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("Render error"));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    if key == self.quit_key {
                        log::info!("{:?} pressed, exiting...", key);
                        event_loop.exit();
                    } else if key == self.fullscreen_key {
                        self.toggle_fullscreen();
                    }
                }
            }

            _ => {}
        }
    }

    /// Continuous redraws for maximum FPS
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

impl<A: Application> Drop for Runner<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reported_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            assert!(counter.tick(start + Duration::from_millis(i * 16)).is_none());
        }

        let stats = counter.tick(start + Duration::from_secs(1)).unwrap();
        assert!((stats.fps - 60.0).abs() < 0.01);
        assert!(stats.frame_time_ms > 0.0);

        // Counter restarts after reporting
        assert!(counter.tick(start + Duration::from_millis(1016)).is_none());
    }

    #[test]
    fn failed_initialize_is_unwound() {
        let mut calls = Vec::new();
        let result = initialize_or_unwind(
            &mut calls,
            &"device",
            |calls: &mut Vec<String>, target: &&str| {
                calls.push(format!("create layout on {}", target));
                anyhow::bail!("shaders/triangle.vert.spv missing")
            },
            |calls: &mut Vec<String>, target: &&str| calls.push(format!("destroy on {}", target)),
        );

        assert!(result.is_err());
        assert_eq!(calls, ["create layout on device", "destroy on device"]);
    }

    #[test]
    fn successful_initialize_is_kept() {
        let mut calls = Vec::new();
        initialize_or_unwind(
            &mut calls,
            &(),
            |calls: &mut Vec<&str>, _: &()| {
                calls.push("init");
                Ok(())
            },
            |calls: &mut Vec<&str>, _: &()| calls.push("destroy"),
        )
        .unwrap();

        assert_eq!(calls, ["init"]);
    }

    #[test]
    fn title_shows_rate_and_mode() {
        let stats = FrameStats { fps: 143.6, frame_time_ms: 6.96 };
        assert_eq!(
            format_title("draw_triangle", stats, false),
            "draw_triangle - 144 FPS (6.96ms) [windowed]"
        );
        assert!(format_title("x", stats, true).ends_with("[fullscreen]"));
    }
}
