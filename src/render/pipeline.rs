use super::camera::Camera;
use super::resources::{GpuResources, RenderTargetDesc, RenderTargetHandle};
use super::{PassInvocation, RenderBackend, RenderError};
use crate::scene::SceneComposition;

/// Number of downsampled levels in the bloom blur chain.
pub const BLOOM_MIPS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassId {
    Base,
    Bloom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomParams {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            strength: 0.0,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Debug, Default)]
struct BasePass {
    target: Option<RenderTargetHandle>,
}

#[derive(Debug, Default)]
struct BloomPass {
    params: BloomParams,
    bright: Option<RenderTargetHandle>,
    mips: Vec<RenderTargetHandle>,
    output: Option<RenderTargetHandle>,
}

impl BloomPass {
    fn release(&mut self, gpu: &mut dyn GpuResources) {
        for target in self
            .bright
            .take()
            .into_iter()
            .chain(self.mips.drain(..))
            .chain(self.output.take())
        {
            gpu.release_render_target(target);
        }
    }

    fn allocate(&mut self, width: u32, height: u32, gpu: &mut dyn GpuResources) {
        let (mut w, mut h) = (half(width), half(height));
        self.bright = Some(gpu.create_render_target(&RenderTargetDesc::new("bloom-bright", w, h)));
        for level in 0..BLOOM_MIPS {
            self.mips.push(gpu.create_render_target(&RenderTargetDesc::new(
                format!("bloom-mip{}", level),
                w,
                h,
            )));
            w = half(w);
            h = half(h);
        }
        self.output = Some(gpu.create_render_target(&RenderTargetDesc::new(
            "bloom-composite",
            width,
            height,
        )));
    }
}

fn half(value: u32) -> u32 {
    (value / 2).max(1)
}

/// Fixed post-processing chain: a base render followed by bloom.
///
/// Every target is sized from one `viewport_size`, and resizing touches the
/// camera projection in the same call, so the two never disagree.
#[derive(Debug)]
pub struct RenderPipeline {
    base: BasePass,
    bloom: BloomPass,
    viewport_size: Option<[u32; 2]>,
}

impl RenderPipeline {
    pub fn new(bloom: BloomParams) -> Self {
        Self {
            base: BasePass::default(),
            bloom: BloomPass {
                params: bloom,
                ..BloomPass::default()
            },
            viewport_size: None,
        }
    }

    pub fn passes(&self) -> [PassId; 2] {
        [PassId::Base, PassId::Bloom]
    }

    pub fn set_bloom_strength(&mut self, strength: f32) {
        self.bloom.params.strength = strength;
    }

    pub fn set_bloom_radius(&mut self, radius: f32) {
        self.bloom.params.radius = radius;
    }

    pub fn set_bloom_threshold(&mut self, threshold: f32) {
        self.bloom.params.threshold = threshold;
    }

    pub fn viewport_size(&self) -> Option<[u32; 2]> {
        self.viewport_size
    }

    /// Reallocates every pass target and updates the camera aspect. Returns
    /// `false` without touching anything when the size is unchanged.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
        camera: &mut Camera,
        gpu: &mut dyn GpuResources,
    ) -> bool {
        let size = [width.max(1), height.max(1)];
        if self.viewport_size == Some(size) {
            return false;
        }
        self.release_targets(gpu);
        self.base.target = Some(gpu.create_render_target(&RenderTargetDesc::new(
            "base", size[0], size[1],
        )));
        self.bloom.allocate(size[0], size[1], gpu);
        camera.set_aspect(size[0] as f32 / size[1] as f32);
        self.viewport_size = Some(size);
        log::debug!("Render pipeline resized to {}x{}", size[0], size[1]);
        true
    }

    /// Runs base then bloom and presents exactly one frame.
    pub fn render<B: RenderBackend>(
        &mut self,
        scene: &SceneComposition,
        backend: &mut B,
    ) -> Result<(), RenderError> {
        let (Some(base), Some(bright), Some(output)) = (
            self.base.target.as_ref(),
            self.bloom.bright.as_ref(),
            self.bloom.output.as_ref(),
        ) else {
            return Err(RenderError::NotSized);
        };
        for pass in self.passes() {
            let invocation = match pass {
                PassId::Base => PassInvocation::Base { target: base },
                PassId::Bloom => PassInvocation::Bloom {
                    params: self.bloom.params,
                    input: base,
                    bright,
                    mips: &self.bloom.mips,
                    output,
                },
            };
            backend.execute(invocation, scene);
        }
        backend.present(output);
        Ok(())
    }

    fn release_targets(&mut self, gpu: &mut dyn GpuResources) {
        if let Some(target) = self.base.target.take() {
            gpu.release_render_target(target);
        }
        self.bloom.release(gpu);
    }

    /// Releases all pass targets. The pipeline can be resized again afterwards.
    pub fn dispose(&mut self, gpu: &mut dyn GpuResources) {
        self.release_targets(gpu);
        self.viewport_size = None;
    }
}
