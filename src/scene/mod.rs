pub mod bounds;
pub mod dispose;
pub mod node;
pub mod slot;

pub use bounds::Aabb;
pub use node::{SceneNode, TextureSlotKind};
pub use slot::{ModelSlot, SlotError, SlotState, SwapOutcome};

use crate::render::camera::Camera;
use crate::render::resources::{GpuResources, TextureHandle};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
}

impl DirectionalLight {
    /// Unit vector pointing from the scene origin towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }
}

/// Everything the render pipeline draws: camera, lights, the environment
/// backdrop and at most one model.
///
/// The model is only ever replaced through [`ModelSlot`], which owns the
/// detach/dispose/attach ordering.
pub struct SceneComposition {
    pub camera: Camera,
    ambient: AmbientLight,
    directional: DirectionalLight,
    environment: Option<TextureHandle>,
    model: Option<SceneNode>,
}

impl SceneComposition {
    pub fn new(camera: Camera, ambient: AmbientLight, directional: DirectionalLight) -> Self {
        Self {
            camera,
            ambient,
            directional,
            environment: None,
            model: None,
        }
    }

    pub fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }

    pub fn directional(&self) -> &DirectionalLight {
        &self.directional
    }

    /// Values outside the panel's range are accepted as-is.
    pub fn set_ambient_intensity(&mut self, intensity: f32) {
        self.ambient.intensity = intensity;
    }

    pub fn set_directional_intensity(&mut self, intensity: f32) {
        self.directional.intensity = intensity;
    }

    pub fn environment(&self) -> Option<&TextureHandle> {
        self.environment.as_ref()
    }

    /// Last write wins; the replaced texture is released.
    pub fn set_environment(&mut self, texture: TextureHandle, gpu: &mut dyn GpuResources) {
        if let Some(previous) = self.environment.replace(texture) {
            log::debug!("Replacing environment texture {:?}", previous.id());
            gpu.release_texture(previous);
        }
    }

    pub fn release_environment(&mut self, gpu: &mut dyn GpuResources) {
        if let Some(texture) = self.environment.take() {
            gpu.release_texture(texture);
        }
    }

    pub fn model(&self) -> Option<&SceneNode> {
        self.model.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub(crate) fn attach_model(&mut self, node: SceneNode) {
        debug_assert!(self.model.is_none(), "attach over a live model");
        self.model = Some(node);
    }

    pub(crate) fn detach_model(&mut self) -> Option<SceneNode> {
        self.model.take()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{AmbientLight, DirectionalLight, SceneComposition};
    use crate::render::camera::Camera;
    use glam::Vec3;

    pub fn composition() -> SceneComposition {
        SceneComposition::new(
            Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0),
            AmbientLight {
                color: [0.25, 0.25, 0.25],
                intensity: 1.0,
            },
            DirectionalLight {
                color: [1.0, 1.0, 1.0],
                intensity: 0.0,
                position: Vec3::new(5.0, 10.0, 7.5),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::composition;
    use crate::assets::model::TextureData;
    use crate::render::headless::HeadlessBackend;
    use crate::render::resources::{GpuResources, ResourceKind};

    #[test]
    fn replacing_environment_releases_previous_texture() {
        let mut gpu = HeadlessBackend::new();
        let mut scene = composition();
        let first = gpu.upload_texture(&TextureData::solid_rgba8("first", [1, 2, 3, 255]));
        let second = gpu.upload_texture(&TextureData::solid_rgba8("second", [1, 2, 3, 255]));
        let second_id = second.id();

        scene.set_environment(first, &mut gpu);
        scene.set_environment(second, &mut gpu);
        assert_eq!(gpu.ledger().live(ResourceKind::Texture), 1);
        assert_eq!(scene.environment().map(|t| t.id()), Some(second_id));

        scene.release_environment(&mut gpu);
        assert!(scene.environment().is_none());
        assert_eq!(gpu.ledger().live(ResourceKind::Texture), 0);
    }

    #[test]
    fn light_intensities_are_not_clamped() {
        let mut scene = composition();
        scene.set_ambient_intensity(3.5);
        scene.set_directional_intensity(-1.0);
        assert_eq!(scene.ambient().intensity, 3.5);
        assert_eq!(scene.directional().intensity, -1.0);
        assert_eq!(scene.ambient().color, [0.25, 0.25, 0.25]);
    }
}
