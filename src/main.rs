use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use shadow_mapping::app::{print_summary, render_headless, write_snapshot, FrameClock};
use shadow_mapping::{
    BuiltinMeshSource, InputEvent, InputQueue, MeshSource, ObjMeshSource, Scene, ShadowConfig,
    ShadowMode, TextureFilter, WgpuDevice,
};

const USAGE: &str = "Usage: shadow-mapping [MESH.obj] [--config FILE.xml] [--resolution N] \
[--mode hard|pcf] [--filter nearest|linear] [--scale F] [--size WxH] [--headless OUT.png] [--frames N]";

/// Snapshot written when the window cannot be opened and no path was given.
const FALLBACK_SNAPSHOT: &str = "shadow-mapping.png";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = options.config()?;
    let meshes: Box<dyn MeshSource> = match &options.mesh {
        Some(path) => Box::new(
            ObjMeshSource::open(path, options.scale)
                .with_context(|| format!("failed to load occluder {}", path.display()))?,
        ),
        None => Box::new(BuiltinMeshSource::default()),
    };
    print_summary(meshes.as_ref(), &config);

    if let Some(output) = &options.headless {
        return run_headless(meshes.as_ref(), config, options.frames, output);
    }

    match run_interactive(meshes.as_ref(), config.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to headless mode (set DISPLAY or install a GPU driver to open a window)."
                );
                run_headless(
                    meshes.as_ref(),
                    config,
                    options.frames,
                    &PathBuf::from(FALLBACK_SNAPSHOT),
                )
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(
    meshes: &dyn MeshSource,
    config: ShadowConfig,
    frames: u32,
    output: &PathBuf,
) -> Result<()> {
    let (device, scene) = render_headless(meshes, config, frames)?;
    println!("Rendered {} frame(s)", scene.frame_count());
    write_snapshot(&device, output)?;
    println!("Wrote snapshot to {}", output.display());
    Ok(())
}

fn run_interactive(meshes: &dyn MeshSource, config: ShadowConfig) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ShadowApp {
        meshes,
        config,
        state: None,
        last_error: None,
    };
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    if let Some(state) = &app.state {
        println!("Rendered {} frame(s)", state.scene.frame_count());
    }
    Ok(())
}

struct ShadowApp<'a> {
    meshes: &'a dyn MeshSource,
    config: ShadowConfig,
    state: Option<AppState>,
    last_error: Option<anyhow::Error>,
}

struct AppState {
    device: WgpuDevice,
    scene: Scene,
    input: InputQueue,
    cursor: Vec2,
    clock: FrameClock,
}

impl ShadowApp<'_> {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<AppState> {
        let (width, height) = self.config.viewport;
        let attributes = Window::default_attributes()
            .with_title("Shadow Mapping")
            .with_inner_size(LogicalSize::new(width as f64, height as f64));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let mut device = block_on(WgpuDevice::new(Arc::clone(&window)))
            .map_err(|err| WindowInitError::from_error("GPU device", format!("{err:#}")))?;

        let mut scene = Scene::new(&mut device, self.meshes, self.config.clone())?;
        let size = window.inner_size();
        scene.set_viewport(size.width, size.height);
        info!("Window opened at {}x{}", size.width, size.height);

        Ok(AppState {
            input: scene.input(),
            device,
            scene,
            cursor: Vec2::ZERO,
            clock: FrameClock::new(),
        })
    }
}

impl ApplicationHandler for ShadowApp<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                self.last_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if window_id != state.device.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.device.resize(size);
                state.scene.set_viewport(size.width, size.height);
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => match button_state {
                ElementState::Pressed => state.input.push(InputEvent::PointerDown(state.cursor)),
                ElementState::Released => state.input.push(InputEvent::PointerUp),
            },
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = Vec2::new(position.x as f32, position.y as f32);
                state.input.push(InputEvent::PointerMove(state.cursor));
            }
            WindowEvent::CursorLeft { .. } => state.input.push(InputEvent::PointerLeave),
            WindowEvent::Touch(touch) => {
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => state.input.push(InputEvent::TouchStart(position)),
                    TouchPhase::Moved => state.input.push(InputEvent::TouchMove(position)),
                    TouchPhase::Ended | TouchPhase::Cancelled => {}
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = state.clock.tick();
                state.scene.run_frame(&mut state.device, dt);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.device.window().request_redraw();
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[derive(Debug, PartialEq)]
struct CliOptions {
    mesh: Option<PathBuf>,
    config_path: Option<PathBuf>,
    resolution: Option<u32>,
    mode: Option<ShadowMode>,
    filter: Option<TextureFilter>,
    size: Option<(u32, u32)>,
    scale: f32,
    headless: Option<PathBuf>,
    frames: u32,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self {
            mesh: None,
            config_path: None,
            resolution: None,
            mode: None,
            filter: None,
            size: None,
            scale: ObjMeshSource::DEFAULT_SCALE,
            headless: None,
            frames: 1,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value.\n{USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config_path = Some(PathBuf::from(value("--config")?)),
                "--resolution" => {
                    options.resolution = Some(parse_flag("--resolution", &value("--resolution")?)?)
                }
                "--mode" => options.mode = Some(parse_flag("--mode", &value("--mode")?)?),
                "--filter" => options.filter = Some(parse_flag("--filter", &value("--filter")?)?),
                "--scale" => options.scale = parse_flag("--scale", &value("--scale")?)?,
                "--size" => options.size = Some(parse_size(&value("--size")?)?),
                "--headless" => options.headless = Some(PathBuf::from(value("--headless")?)),
                "--frames" => options.frames = parse_flag("--frames", &value("--frames")?)?,
                "-h" | "--help" => return Err(anyhow!("{USAGE}")),
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}.\n{USAGE}"));
                }
                path => {
                    if options.mesh.is_some() {
                        return Err(anyhow!("Unexpected extra argument: {path}.\n{USAGE}"));
                    }
                    options.mesh = Some(PathBuf::from(path));
                }
            }
        }
        Ok(options)
    }

    /// Configuration file (if any) with the command-line overrides applied.
    fn config(&self) -> Result<ShadowConfig> {
        let mut config = match &self.config_path {
            Some(path) => {
                let xml = std::fs::read_to_string(path)
                    .with_context(|| format!("unable to read {}", path.display()))?;
                ShadowConfig::from_xml(&xml)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => ShadowConfig::default(),
        };
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(filter) = self.filter {
            config.filter = filter;
        }
        if let Some(size) = self.size {
            config.viewport = size;
        }
        if self.frames == 0 {
            warn!("--frames 0 renders nothing; the snapshot will be blank");
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag<T>(flag: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|err| anyhow!("invalid value `{value}` for {flag}: {err}"))
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| anyhow!("invalid size `{value}`, expected WIDTHxHEIGHT"))?;
    Ok((
        parse_flag("--size", width.trim())?,
        parse_flag("--size", height.trim())?,
    ))
}
