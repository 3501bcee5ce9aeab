use super::camera::Camera;
use super::pipeline::RenderPipeline;
use super::resources::GpuResources;

/// Keeps camera aspect, projection and pipeline targets in step with the
/// window size.
#[derive(Debug, Default)]
pub struct ViewportController {
    size: Option<[u32; 2]>,
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new surface size. Zero extents clamp to one pixel; the same
    /// size twice in a row changes nothing and returns `false`.
    pub fn resize(
        &mut self,
        size: [u32; 2],
        camera: &mut Camera,
        pipeline: &mut RenderPipeline,
        gpu: &mut dyn GpuResources,
    ) -> bool {
        let size = [size[0].max(1), size[1].max(1)];
        if self.size == Some(size) && pipeline.viewport_size() == Some(size) {
            return false;
        }
        pipeline.resize(size[0], size[1], camera, gpu);
        self.size = Some(size);
        log::info!("Viewport resized to {}x{}", size[0], size[1]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::ViewportController;
    use crate::render::camera::Camera;
    use crate::render::headless::HeadlessBackend;
    use crate::render::pipeline::{BloomParams, RenderPipeline};
    use crate::render::resources::ResourceKind;

    #[test]
    fn repeated_size_changes_nothing_observable() {
        let mut gpu = HeadlessBackend::new();
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        let mut pipeline = RenderPipeline::new(BloomParams::default());
        let mut viewport = ViewportController::new();

        assert!(viewport.resize([1280, 720], &mut camera, &mut pipeline, &mut gpu));
        let aspect = camera.aspect();
        let projection = camera.projection();
        let targets = gpu.ledger().allocated(ResourceKind::RenderTarget);

        assert!(!viewport.resize([1280, 720], &mut camera, &mut pipeline, &mut gpu));
        assert_eq!(camera.aspect(), aspect);
        assert_eq!(camera.projection(), projection);
        assert_eq!(gpu.ledger().allocated(ResourceKind::RenderTarget), targets);
    }

    #[test]
    fn minimized_window_clamps_to_one_pixel() {
        let mut gpu = HeadlessBackend::new();
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        let mut pipeline = RenderPipeline::new(BloomParams::default());
        let mut viewport = ViewportController::new();

        viewport.resize([0, 300], &mut camera, &mut pipeline, &mut gpu);
        assert_eq!(pipeline.viewport_size(), Some([1, 300]));
        assert!((camera.aspect() - 1.0 / 300.0).abs() < 1e-6);
    }

    #[test]
    fn resize_after_pipeline_dispose_reallocates() {
        let mut gpu = HeadlessBackend::new();
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        let mut pipeline = RenderPipeline::new(BloomParams::default());
        let mut viewport = ViewportController::new();

        viewport.resize([200, 100], &mut camera, &mut pipeline, &mut gpu);
        pipeline.dispose(&mut gpu);
        assert!(viewport.resize([200, 100], &mut camera, &mut pipeline, &mut gpu));
        assert!(gpu.ledger().live(ResourceKind::RenderTarget) > 0);
    }
}
