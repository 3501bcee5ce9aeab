pub(crate) mod egui_host;
pub mod frame_loop;
mod input;
pub mod listeners;
mod timing;

use crate::assets::{AssetSource, FileAssetSource};
use crate::config::ViewerConfig;
use crate::render::egui_overlay::EguiOverlay;
use crate::render::{HeadlessBackend, PainterBackend, RenderError};
use crate::ui::panel::{self, PanelAction};
use crate::viewer::{TeardownReport, Viewer, ViewerError};
use egui_host::EguiHost;
use input::InputState;
use timing::FrameTiming;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Showroom";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(
        "teardown left {leaked} GPU resources, {models} models, {listeners} listeners and {bindings} controls behind"
    )]
    Unclean {
        leaked: usize,
        models: usize,
        listeners: usize,
        bindings: usize,
    },
}

/// Everything that exists only while the window does.
struct Session {
    window: Arc<Window>,
    egui: EguiHost,
    overlay: EguiOverlay,
    viewer: Viewer<PainterBackend>,
}

impl Session {
    fn open(event_loop: &ActiveEventLoop, config: &ViewerConfig, source: Arc<dyn AssetSource>) -> Result<Self, AppError> {
        let [width, height] = config.window_size;
        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let egui = EguiHost::new(&window);
        let overlay = EguiOverlay::new(Arc::clone(&window))?;
        let size = window.inner_size();
        let backend = PainterBackend::new(egui.context().clone());
        let viewer = Viewer::init(config, backend, source, [size.width, size.height])?;
        Ok(Self {
            window,
            egui,
            overlay,
            viewer,
        })
    }
}

pub struct App {
    config: ViewerConfig,
    source: Arc<dyn AssetSource>,
    session: Option<Session>,
    input: InputState,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    failure: Option<AppError>,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let source: Arc<dyn AssetSource> = Arc::new(FileAssetSource::new(config.asset_root.clone()));
        Self {
            config,
            source,
            session: None,
            input: InputState::default(),
            timing: FrameTiming::new(WINDOW_TITLE),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            failure: None,
        }
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn redraw(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let started = Instant::now();
        let (left, up) = self.input.key_rotation(self.timing.frame_dt());
        if left != 0.0 || up != 0.0 {
            session.viewer.orbit_rotate(left, up);
        }
        let tick = match session.viewer.frame(started) {
            Ok(Some(tick)) => tick,
            Ok(None) => return,
            Err(err) => {
                log::error!("Frame failed: {}", err);
                return;
            }
        };

        let viewer = &session.viewer;
        let mut actions = Vec::new();
        let output = session.egui.run_ui(&session.window, |ctx| {
            let painter = ctx.layer_painter(egui::LayerId::background());
            viewer.backend().paint(&painter, ctx.screen_rect());
            actions = panel::show(ctx, viewer.controls(), viewer.loading_model());
        });
        for action in actions {
            apply_action(&mut session.viewer, action);
        }
        if let Err(err) = session.overlay.render(output) {
            log::error!("Failed to present UI: {}", err);
        }

        self.timing.set_render_ms(started.elapsed().as_secs_f32() * 1000.0);
        self.timing.update(&session.window, started, tick.dt);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            if let Err(err) = check_teardown(&session.viewer.teardown()) {
                self.failure = Some(err);
            }
        }
        event_loop.exit();
    }
}

fn apply_action(viewer: &mut Viewer<PainterBackend>, action: PanelAction) {
    match action {
        PanelAction::Set { name, value } => {
            if let Err(err) = viewer.set_control(&name, value) {
                log::warn!("Rejected control change: {}", err);
            }
        }
        PanelAction::AddModel => {
            let Some(path) = panel::pick_model_file() else {
                return;
            };
            let name = model_name(&path);
            if let Err(err) = viewer.add_model(&name, &path) {
                log::warn!("Could not add model '{}': {}", name, err);
            }
        }
    }
}

fn check_teardown<B>(report: &TeardownReport<B>) -> Result<(), AppError> {
    let clean = report.leaked_resources == 0
        && report.attached_models == 0
        && report.listeners == 0
        && report.bindings == 0;
    if clean {
        return Ok(());
    }
    Err(AppError::Unclean {
        leaked: report.leaked_resources,
        models: report.attached_models,
        listeners: report.listeners,
        bindings: report.bindings,
    })
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("model")
        .to_string()
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        match Session::open(event_loop, &self.config, Arc::clone(&self.source)) {
            Ok(session) => {
                let window = Arc::clone(&session.window);
                self.session = Some(session);
                self.update_target_frame_duration(&window);
                window.request_redraw();
            }
            Err(err) => {
                log::error!("Failed to open viewer: {}", err);
                self.failure = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let consumed = session.egui.on_window_event(&session.window, &event);

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.shutdown(event_loop);
                    return;
                }
                if !consumed {
                    self.input
                        .handle_key(event.physical_key, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::Resized(new_size) => {
                session.overlay.resize(new_size.width, new_size.height);
                session.viewer.resize([new_size.width, new_size.height]);
                let window = Arc::clone(&session.window);
                self.update_target_frame_duration(&window);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let delta = self.input.handle_cursor(position.x as f32, position.y as f32);
                if let (Some((dx, dy)), false) = (delta, consumed) {
                    session.viewer.orbit_drag(dx, dy);
                }
            }
            WindowEvent::CursorLeft { .. } => self.input.cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => {
                if !consumed || state == ElementState::Released {
                    self.input.handle_button(button, state);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if !consumed {
                    session.viewer.orbit_zoom(InputState::wheel_steps(delta));
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = &self.session else {
            return;
        };
        if !session.viewer.is_running() {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            session.window.request_redraw();
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

/// Opens the window and runs until it is closed.
pub fn run(config: ViewerConfig) -> Result<(), AppError> {
    log::info!("{} - press ESC or close the window to exit", WINDOW_TITLE);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Renders `frames` frames without a window and reports the resource ledger.
pub fn run_headless(config: ViewerConfig, frames: u64) -> Result<(), AppError> {
    let source: Arc<dyn AssetSource> = Arc::new(FileAssetSource::new(config.asset_root.clone()));
    let mut viewer = Viewer::init(&config, HeadlessBackend::new(), source, config.window_size)?;
    if !viewer.wait_for_loads(Duration::from_secs(30)) {
        log::warn!("Continuing with loads still pending");
    }
    if let Some(status) = viewer.controls().status() {
        log::warn!("{}", status);
    }
    for _ in 0..frames {
        viewer.frame(Instant::now())?;
    }
    log::info!(
        "Rendered {} frames with model {:?}",
        viewer.backend().presented_frames(),
        viewer.slot().attached_name()
    );
    if let Some(frame) = viewer.backend().last_frame() {
        log::info!("Last {}", frame);
    }
    let report = viewer.teardown();
    log::info!("{}", report.backend.summary());
    check_teardown(&report)
}
