use crate::app::frame_loop::{FrameLoop, FrameTick};
use crate::app::listeners::{EventListeners, WindowSignal};
use crate::assets::{AssetLoaderAdapter, AssetSource, LoadCompletion};
use crate::config::{hex_to_linear, CatalogEntry, ConfigError, ViewerConfig};
use crate::render::camera::{Camera, OrbitControls};
use crate::render::pipeline::{BloomParams, RenderPipeline};
use crate::render::viewport::ViewportController;
use crate::render::{RenderBackend, RenderError};
use crate::scene::{AmbientLight, DirectionalLight, ModelSlot, SceneComposition, SlotError, SlotState, SwapOutcome};
use crate::ui::{ControlError, ControlPanel, ControlValue, StatusSource, ValueDomain};
use glam::Vec3;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MODEL_CONTROL: &str = "model";
pub const BLOOM_CONTROL: &str = "bloom strength";
pub const BLOOM_RADIUS_CONTROL: &str = "bloom radius";
pub const BLOOM_THRESHOLD_CONTROL: &str = "bloom threshold";
pub const AMBIENT_CONTROL: &str = "ambient light";
pub const DIRECTIONAL_CONTROL: &str = "directional light";

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("control setup failed: {0}")]
    Control(#[from] ControlError),
}

/// State the control handlers act on.
pub struct ViewerCore<B: RenderBackend> {
    pub backend: B,
    pub scene: SceneComposition,
    pub slot: ModelSlot,
    pub pipeline: RenderPipeline,
    pub viewport: ViewportController,
    pub orbit: OrbitControls,
    pub frame_loop: FrameLoop,
    loader: AssetLoaderAdapter,
    catalog: Vec<CatalogEntry>,
}

impl<B: RenderBackend> ViewerCore<B> {
    fn model_path(&self, name: &str) -> Option<PathBuf> {
        self.catalog
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.path.clone())
    }

    fn request_model(&mut self, name: &str) {
        match self.model_path(name) {
            Some(path) => {
                self.slot.swap(name, &path, &mut self.loader);
            }
            None => log::warn!("Model '{}' is not in the catalog", name),
        }
    }
}

fn on_model<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Choice(name) = value {
        core.request_model(name);
    }
}

fn on_bloom_strength<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Number(strength) = value {
        core.pipeline.set_bloom_strength(*strength);
    }
}

fn on_bloom_radius<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Number(radius) = value {
        core.pipeline.set_bloom_radius(*radius);
    }
}

fn on_bloom_threshold<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Number(threshold) = value {
        core.pipeline.set_bloom_threshold(*threshold);
    }
}

fn on_ambient<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Number(intensity) = value {
        core.scene.set_ambient_intensity(*intensity);
    }
}

fn on_directional<B: RenderBackend>(core: &mut ViewerCore<B>, value: &ControlValue) {
    if let ControlValue::Number(intensity) = value {
        core.scene.set_directional_intensity(*intensity);
    }
}

/// What was left over after [`Viewer::teardown`].
pub struct TeardownReport<B> {
    pub backend: B,
    pub attached_models: usize,
    pub listeners: usize,
    pub bindings: usize,
    pub leaked_resources: usize,
}

pub struct Viewer<B: RenderBackend> {
    core: ViewerCore<B>,
    controls: ControlPanel<ViewerCore<B>>,
    listeners: EventListeners,
}

impl<B: RenderBackend> Viewer<B> {
    /// Builds the scene and pipeline for `size`, starts the environment load
    /// and requests the default model.
    pub fn init(
        config: &ViewerConfig,
        mut backend: B,
        source: Arc<dyn AssetSource>,
        size: [u32; 2],
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let lights = &config.lights;
        let camera_settings = &config.camera;
        let mut scene = SceneComposition::new(
            Camera::new(
                camera_settings.position,
                camera_settings.fov_y_deg,
                camera_settings.near,
                camera_settings.far,
            ),
            AmbientLight {
                color: hex_to_linear(lights.ambient_color),
                intensity: lights.ambient_intensity,
            },
            DirectionalLight {
                color: hex_to_linear(lights.directional_color),
                intensity: lights.directional_intensity,
                position: Vec3::from(lights.directional_position),
            },
        );
        let mut pipeline = RenderPipeline::new(BloomParams {
            strength: config.bloom.strength,
            radius: config.bloom.radius,
            threshold: config.bloom.threshold,
        });
        let mut viewport = ViewportController::new();
        viewport.resize(size, &mut scene.camera, &mut pipeline, &mut backend);

        let mut loader = AssetLoaderAdapter::new(source);
        loader.load_environment(&config.environment);

        let mut core = ViewerCore {
            backend,
            scene,
            slot: ModelSlot::new(config.display_scale),
            pipeline,
            viewport,
            orbit: OrbitControls::new(config.orbit_damping),
            frame_loop: FrameLoop::new(),
            loader,
            catalog: config.catalog.clone(),
        };

        let mut controls = ControlPanel::new();
        let names = config.catalog.iter().map(|entry| entry.name.clone()).collect();
        controls.register(
            MODEL_CONTROL,
            ValueDomain::Choice(names),
            ControlValue::Choice(config.default_model.clone()),
            on_model::<B>,
        )?;
        controls.register(
            BLOOM_CONTROL,
            ValueDomain::range(0.0, 3.0, 0.01),
            ControlValue::Number(config.bloom.strength.clamp(0.0, 3.0)),
            on_bloom_strength::<B>,
        )?;
        controls.register(
            BLOOM_RADIUS_CONTROL,
            ValueDomain::range(0.0, 1.0, 0.01),
            ControlValue::Number(config.bloom.radius.clamp(0.0, 1.0)),
            on_bloom_radius::<B>,
        )?;
        controls.register(
            BLOOM_THRESHOLD_CONTROL,
            ValueDomain::range(0.0, 1.0, 0.01),
            ControlValue::Number(config.bloom.threshold.clamp(0.0, 1.0)),
            on_bloom_threshold::<B>,
        )?;
        controls.register(
            AMBIENT_CONTROL,
            ValueDomain::range(0.0, 2.0, 0.01),
            ControlValue::Number(lights.ambient_intensity.clamp(0.0, 2.0)),
            on_ambient::<B>,
        )?;
        controls.register(
            DIRECTIONAL_CONTROL,
            ValueDomain::range(0.0, 2.0, 0.01),
            ControlValue::Number(lights.directional_intensity.clamp(0.0, 2.0)),
            on_directional::<B>,
        )?;

        let mut listeners = EventListeners::new();
        for signal in [WindowSignal::Resize, WindowSignal::Pointer, WindowSignal::Wheel] {
            listeners.add(signal);
        }

        core.request_model(&config.default_model);
        core.frame_loop.start();
        log::info!(
            "Viewer initialized at {}x{} with {} catalog models",
            size[0],
            size[1],
            core.catalog.len()
        );
        Ok(Self {
            core,
            controls,
            listeners,
        })
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.core.slot
    }

    pub fn controls(&self) -> &ControlPanel<ViewerCore<B>> {
        &self.controls
    }

    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    pub fn is_running(&self) -> bool {
        self.core.frame_loop.is_running()
    }

    /// Name of the model being loaded, while a swap is pending.
    pub fn loading_model(&self) -> Option<&str> {
        match self.core.slot.state() {
            SlotState::Loading => self.core.slot.pending_name(),
            SlotState::Empty | SlotState::Attached => None,
        }
    }

    /// The single mutation entry for panel values.
    pub fn set_control(&mut self, name: &str, value: ControlValue) -> Result<bool, ControlError> {
        self.controls.set(name, value, &mut self.core)
    }

    pub fn select_model(&mut self, name: &str) -> Result<bool, ControlError> {
        self.set_control(MODEL_CONTROL, ControlValue::Choice(name.to_string()))
    }

    /// Adds a catalog entry (replacing the path of an existing name) and
    /// selects it.
    pub fn add_model(&mut self, name: &str, path: &Path) -> Result<(), ControlError> {
        match self.core.catalog.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.path = path.to_path_buf(),
            None => self.core.catalog.push(CatalogEntry::new(name, path)),
        }
        self.controls.add_choice(MODEL_CONTROL, name)?;
        if !self.select_model(name)? {
            self.core.request_model(name);
        }
        Ok(())
    }

    pub fn resize(&mut self, size: [u32; 2]) -> bool {
        if !self.listeners.listens(WindowSignal::Resize) {
            return false;
        }
        let core = &mut self.core;
        core.viewport
            .resize(size, &mut core.scene.camera, &mut core.pipeline, &mut core.backend)
    }

    pub fn orbit_drag(&mut self, dx: f32, dy: f32) {
        if self.listeners.listens(WindowSignal::Pointer) {
            let height = self
                .core
                .pipeline
                .viewport_size()
                .map(|size| size[1] as f32)
                .unwrap_or(1.0);
            self.core.orbit.drag(dx, dy, height);
        }
    }

    pub fn orbit_zoom(&mut self, steps: f32) {
        if self.listeners.listens(WindowSignal::Wheel) {
            self.core.orbit.zoom(steps);
        }
    }

    pub fn orbit_rotate(&mut self, left: f32, up: f32) {
        self.core.orbit.rotate_left(left);
        self.core.orbit.rotate_up(up);
    }

    /// Applies every finished load without blocking.
    pub fn pump_loads(&mut self) {
        while let Some(completion) = self.core.loader.poll(&mut self.core.backend) {
            self.apply_completion(completion);
        }
    }

    /// Blocks until no load is in flight or `timeout` passes.
    pub fn wait_for_loads(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.core.loader.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!("{} loads still pending after {:?}", self.core.loader.in_flight(), timeout);
                return false;
            }
            if let Some(completion) = self.core.loader.wait(&mut self.core.backend, remaining) {
                self.apply_completion(completion);
            }
        }
        true
    }

    fn apply_completion(&mut self, completion: LoadCompletion) {
        let core = &mut self.core;
        match completion {
            LoadCompletion::Model(model) => {
                match core.slot.resolve(model, &mut core.scene, &mut core.backend) {
                    Ok(SwapOutcome::Attached { .. }) => self.controls.clear_status(StatusSource::Model),
                    Ok(SwapOutcome::Discarded { .. }) => {}
                    Err(err) => {
                        log::warn!("{}", err);
                        self.controls.set_status(StatusSource::Model, describe_error(&err));
                    }
                }
            }
            LoadCompletion::Environment(environment) => match environment.result {
                Ok(texture) => {
                    self.controls.clear_status(StatusSource::Environment);
                    let [width, height] = texture.size();
                    log::info!(
                        "Environment map {} ready ({}x{})",
                        environment.path.display(),
                        width,
                        height
                    );
                    core.scene.set_environment(texture, &mut core.backend);
                }
                Err(err) => {
                    log::warn!("Environment map unavailable: {}", err);
                    self.controls
                        .set_status(StatusSource::Environment, format!("Environment: {}", err));
                }
            },
        }
    }

    /// Runs one frame if the loop is running: apply loads, advance orbit
    /// damping, render.
    pub fn frame(&mut self, now: Instant) -> Result<Option<FrameTick>, RenderError> {
        let Some(tick) = self.core.frame_loop.tick(now) else {
            return Ok(None);
        };
        self.pump_loads();
        let core = &mut self.core;
        core.orbit.update(&mut core.scene.camera);
        core.pipeline.render(&core.scene, &mut core.backend)?;
        Ok(Some(tick))
    }

    /// Stops the loop and releases everything the viewer created, in
    /// dependency order.
    pub fn teardown(self) -> TeardownReport<B> {
        let Viewer {
            mut core,
            mut controls,
            mut listeners,
        } = self;
        core.frame_loop.stop();
        core.pipeline.dispose(&mut core.backend);
        core.slot.clear(&mut core.scene, &mut core.backend);
        core.scene.release_environment(&mut core.backend);
        let detached = listeners.clear();
        let bindings = controls.destroy();
        let leaked_resources = core.backend.dispose();
        log::info!(
            "Viewer torn down: {} listeners detached, {} controls destroyed, {} leaked resources",
            detached,
            bindings,
            leaked_resources
        );
        TeardownReport {
            attached_models: usize::from(core.scene.has_model()),
            listeners: listeners.len(),
            bindings: controls.len(),
            leaked_resources,
            backend: core.backend,
        }
    }
}

fn describe_error(err: &SlotError) -> String {
    match std::error::Error::source(err) {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Viewer, AMBIENT_CONTROL, BLOOM_CONTROL, BLOOM_RADIUS_CONTROL, BLOOM_THRESHOLD_CONTROL,
        MODEL_CONTROL,
    };
    use crate::app::listeners::WindowSignal;
    use crate::assets::testing::{boxed_model, MemoryAssetSource};
    use crate::config::{CatalogEntry, ViewerConfig};
    use crate::render::headless::{HeadlessBackend, PassRecord};
    use crate::render::resources::ResourceKind;
    use crate::scene::SlotState;
    use crate::ui::ControlValue;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn source() -> Arc<MemoryAssetSource> {
        Arc::new(
            MemoryAssetSource::new()
                .with_model("/models/basket.glb", boxed_model("basket", [2.0, 0.0, 0.0], [4.0, 1.0, 1.0]))
                .with_model("/models/jordan.glb", boxed_model("jordan", [-3.0, -3.0, -3.0], [-1.0, 0.0, 2.0])),
        )
    }

    fn config() -> ViewerConfig {
        ViewerConfig {
            catalog: vec![
                CatalogEntry::new("Dunk", "/models/basket.glb"),
                CatalogEntry::new("Jordan", "/models/jordan.glb"),
            ],
            default_model: "Dunk".to_string(),
            ..ViewerConfig::default()
        }
    }

    fn viewer() -> Viewer<HeadlessBackend> {
        let mut viewer = Viewer::init(&config(), HeadlessBackend::new(), source(), [1280, 720]).unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));
        viewer
    }

    #[test]
    fn showroom_scenario_swap_bloom_teardown() {
        let mut viewer = viewer();
        assert_eq!(viewer.slot().attached_name(), Some("Dunk"));
        assert_eq!(viewer.core.scene.model().map(|m| m.name.as_str()), Some("basket"));
        assert!(viewer.core.scene.environment().is_some());
        assert_eq!(viewer.backend().ledger().live(ResourceKind::Geometry), 1);

        viewer.select_model("Jordan").unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));
        assert_eq!(viewer.slot().attached_name(), Some("Jordan"));
        let model = viewer.core.scene.model().unwrap();
        assert_eq!(model.name, "jordan");
        assert!(model.world_bounds().center().length() < 1e-4);
        // 2x3x5 box scaled by 2.
        assert!((model.world_bounds().size() - glam::Vec3::new(4.0, 6.0, 10.0)).length() < 1e-4);
        let ledger = viewer.backend().ledger();
        assert_eq!(ledger.released(ResourceKind::Geometry), 1);
        assert_eq!(ledger.released(ResourceKind::Material), 1);
        assert_eq!(ledger.live(ResourceKind::Geometry), 1);
        assert_eq!(ledger.live(ResourceKind::Material), 1);

        let camera_before = viewer.core.scene.camera;
        let ambient_before = *viewer.core.scene.ambient();
        let directional_before = *viewer.core.scene.directional();
        viewer.set_control(BLOOM_CONTROL, ControlValue::Number(1.5)).unwrap();
        let tick = viewer.frame(Instant::now()).unwrap();
        assert!(tick.is_some());
        let frame = viewer.backend().last_frame().unwrap();
        match &frame.passes[1] {
            PassRecord::Bloom { params, .. } => assert_eq!(params.strength, 1.5),
            other => panic!("expected bloom pass, got {other:?}"),
        }
        assert_eq!(viewer.core.scene.camera, camera_before);
        assert_eq!(*viewer.core.scene.ambient(), ambient_before);
        assert_eq!(*viewer.core.scene.directional(), directional_before);

        let report = viewer.teardown();
        assert_eq!(report.attached_models, 0);
        assert_eq!(report.listeners, 0);
        assert_eq!(report.bindings, 0);
        assert_eq!(report.leaked_resources, 0);
        let ledger = report.backend.ledger();
        for kind in ResourceKind::ALL {
            assert_eq!(ledger.allocated(kind), ledger.released(kind), "{kind:?}");
        }
    }

    #[test]
    fn bloom_radius_and_threshold_sliders_reach_the_bloom_pass() {
        let mut viewer = viewer();
        viewer.set_control(BLOOM_RADIUS_CONTROL, ControlValue::Number(0.7)).unwrap();
        viewer.set_control(BLOOM_THRESHOLD_CONTROL, ControlValue::Number(0.3)).unwrap();
        assert!(viewer
            .set_control(BLOOM_THRESHOLD_CONTROL, ControlValue::Number(1.5))
            .is_err());

        viewer.frame(Instant::now()).unwrap();
        match &viewer.backend().last_frame().unwrap().passes[1] {
            PassRecord::Bloom { params, .. } => {
                assert_eq!(params.radius, 0.7);
                assert_eq!(params.threshold, 0.3);
            }
            other => panic!("expected bloom pass, got {other:?}"),
        }
        assert_eq!(viewer.teardown().leaked_resources, 0);
    }

    #[test]
    fn failed_swap_keeps_old_model_and_reports_status() {
        let mut viewer = viewer();
        viewer.add_model("Broken", Path::new("/models/broken.glb")).unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));

        assert_eq!(viewer.slot().state(), SlotState::Attached);
        assert_eq!(viewer.slot().attached_name(), Some("Dunk"));
        assert_eq!(
            viewer.controls().binding(MODEL_CONTROL).map(|binding| &binding.value),
            Some(&ControlValue::Choice("Broken".into()))
        );
        let status = viewer.controls().status().unwrap();
        assert!(status.contains("Broken"), "{status}");
        assert_eq!(viewer.teardown().leaked_resources, 0);
    }

    #[test]
    fn environment_failure_stays_reported_after_model_attaches() {
        let source = Arc::new(
            MemoryAssetSource::new()
                .with_model("/models/basket.glb", boxed_model("basket", [0.0; 3], [1.0; 3]))
                .with_model_delay(Duration::from_millis(200))
                .without_environment(),
        );
        let mut viewer = Viewer::init(&config(), HeadlessBackend::new(), source, [640, 480]).unwrap();
        assert_eq!(viewer.loading_model(), Some("Dunk"));
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));

        assert_eq!(viewer.loading_model(), None);
        assert_eq!(viewer.slot().attached_name(), Some("Dunk"));
        assert!(viewer.core.scene.environment().is_none());
        let status = viewer.controls().status().unwrap();
        assert!(status.starts_with("Environment:"), "{status}");

        viewer.add_model("Broken", Path::new("/models/broken.glb")).unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));
        let status = viewer.controls().status().unwrap();
        assert!(status.starts_with("Environment:") && status.contains("Broken"), "{status}");

        viewer.select_model("Dunk").unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));
        let status = viewer.controls().status().unwrap();
        assert!(status.starts_with("Environment:"), "{status}");
        assert!(!status.contains("Broken"), "{status}");
        assert_eq!(viewer.teardown().leaked_resources, 0);
    }

    #[test]
    fn rapid_selection_attaches_only_the_last_choice() {
        let mut viewer = Viewer::init(&config(), HeadlessBackend::new(), source(), [640, 480]).unwrap();
        viewer.select_model("Jordan").unwrap();
        viewer.select_model("Dunk").unwrap();
        assert!(viewer.wait_for_loads(Duration::from_secs(5)));
        assert_eq!(viewer.slot().attached_name(), Some("Dunk"));
        assert_eq!(viewer.backend().ledger().live(ResourceKind::Geometry), 1);
        viewer.teardown();
    }

    #[test]
    fn lights_and_resize_go_through_the_viewer() {
        let mut viewer = viewer();
        viewer.set_control(AMBIENT_CONTROL, ControlValue::Number(0.5)).unwrap();
        assert_eq!(viewer.core.scene.ambient().intensity, 0.5);
        assert!(viewer.set_control(AMBIENT_CONTROL, ControlValue::Number(2.5)).is_err());

        assert!(viewer.listeners.listens(WindowSignal::Resize));
        assert!(viewer.resize([800, 800]));
        assert!(!viewer.resize([800, 800]));
        assert_eq!(viewer.core.scene.camera.aspect(), 1.0);
        viewer.teardown();
    }

    #[test]
    fn stopped_viewer_renders_nothing() {
        let mut viewer = viewer();
        viewer.core.frame_loop.stop();
        assert!(!viewer.is_running());
        assert!(viewer.frame(Instant::now()).unwrap().is_none());
        assert_eq!(viewer.backend().presented_frames(), 0);
        viewer.teardown();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.default_model = "Air".into();
        assert!(Viewer::init(&config, HeadlessBackend::new(), source(), [10, 10]).is_err());
    }
}
