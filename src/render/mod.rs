pub mod camera;
pub mod egui_overlay;
pub mod headless;
pub mod painter;
pub mod pipeline;
pub mod resources;
pub mod viewport;

pub use headless::HeadlessBackend;
pub use painter::PainterBackend;

use crate::scene::SceneComposition;
use pipeline::BloomParams;
use resources::{GpuResources, RenderTargetHandle};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render pipeline has no viewport size yet")]
    NotSized,
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface has no supported texture format")]
    NoSurfaceFormat,
    #[error("failed to acquire surface texture: {0}")]
    AcquireFrame(#[from] wgpu::SurfaceError),
}

/// One pass of a frame, with the targets it reads and writes.
#[derive(Debug)]
pub enum PassInvocation<'a> {
    Base {
        target: &'a RenderTargetHandle,
    },
    Bloom {
        params: BloomParams,
        input: &'a RenderTargetHandle,
        bright: &'a RenderTargetHandle,
        mips: &'a [RenderTargetHandle],
        output: &'a RenderTargetHandle,
    },
}

/// Rendering backend driven by the [`RenderPipeline`](pipeline::RenderPipeline).
pub trait RenderBackend: GpuResources {
    fn execute(&mut self, pass: PassInvocation<'_>, scene: &SceneComposition);

    /// Makes `frame` the visible image. Called once per rendered frame.
    fn present(&mut self, frame: &RenderTargetHandle);

    /// Drops every backend-side resource still alive. Returns how many
    /// resources were outstanding; anything non-zero is a leak upstream.
    fn dispose(&mut self) -> usize;
}
