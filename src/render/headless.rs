use super::pipeline::BloomParams;
use super::resources::{
    GeometryHandle, GpuResources, MaterialHandle, RenderTargetDesc, RenderTargetHandle,
    ResourceId, ResourceKind, ResourceTable, TextureHandle,
};
use super::{PassInvocation, RenderBackend};
use crate::assets::model::{MaterialData, MeshData, TextureData};
use crate::scene::SceneComposition;
use std::fmt;

#[derive(Debug, Clone)]
pub struct HeadlessResource {
    pub label: String,
    pub size: [u32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassRecord {
    Base {
        target: ResourceId,
        meshes: usize,
        triangles: usize,
        ambient: f32,
        directional: f32,
        has_environment: bool,
    },
    Bloom {
        params: BloomParams,
        mips: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub index: u64,
    pub presented: ResourceId,
    pub size: [u32; 2],
    pub passes: Vec<PassRecord>,
    pub camera_aspect: f32,
}

impl fmt::Display for PassRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassRecord::Base {
                target,
                meshes,
                triangles,
                ambient,
                directional,
                has_environment,
            } => write!(
                f,
                "base -> #{} ({} meshes, {} triangles, ambient {:.2}, directional {:.2}, environment {})",
                target.raw(),
                meshes,
                triangles,
                ambient,
                directional,
                if *has_environment { "on" } else { "off" }
            ),
            PassRecord::Bloom { params, mips } => write!(
                f,
                "bloom (strength {:.2}, radius {:.2}, threshold {:.2}, {} mips)",
                params.strength, params.radius, params.threshold, mips
            ),
        }
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {} presented #{} ({}x{}) at aspect {:.3}",
            self.index,
            self.presented.raw(),
            self.size[0],
            self.size[1],
            self.camera_aspect
        )?;
        for pass in &self.passes {
            write!(f, "; {}", pass)?;
        }
        Ok(())
    }
}

/// Backend without a GPU. Tracks every allocation and records what each frame
/// asked for, for tests and `--headless` runs.
#[derive(Default)]
pub struct HeadlessBackend {
    table: ResourceTable<HeadlessResource>,
    triangles: std::collections::HashMap<ResourceId, usize>,
    recording: Vec<PassRecord>,
    camera_aspect: f32,
    last_frame: Option<FrameRecord>,
    presented: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &ResourceTable<HeadlessResource> {
        &self.table
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.last_frame.as_ref()
    }

    /// Size of the live render target with `label`, if any.
    #[cfg(test)]
    pub fn target_size_of_label(&self, label: &str) -> Option<[u32; 2]> {
        self.table
            .iter()
            .find(|(kind, entry)| *kind == ResourceKind::RenderTarget && entry.label == label)
            .map(|(_, entry)| entry.size)
    }

    pub fn summary(&self) -> String {
        ResourceKind::ALL
            .iter()
            .map(|kind| {
                format!(
                    "{:?}: {} allocated, {} released, {} live",
                    kind,
                    self.table.allocated(*kind),
                    self.table.released(*kind),
                    self.table.live(*kind)
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn release(&mut self, id: ResourceId, kind: ResourceKind) {
        if let Some(resource) = self.table.remove(id, kind) {
            log::trace!(
                "Released {:?} '{}' ({}x{})",
                kind,
                resource.label,
                resource.size[0],
                resource.size[1]
            );
        }
    }
}

impl GpuResources for HeadlessBackend {
    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryHandle {
        let handle = self.table.insert_geometry(HeadlessResource {
            label: "geometry".to_string(),
            size: [mesh.positions.len() as u32, mesh.indices.len() as u32],
        });
        self.triangles.insert(handle.id(), mesh.triangle_count());
        handle
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        self.triangles.remove(&handle.id());
        self.release(handle.id(), ResourceKind::Geometry);
    }

    fn create_material(&mut self, material: &MaterialData) -> MaterialHandle {
        log::trace!(
            "Material '{}' metallic {:.2} roughness {:.2}",
            material.name,
            material.metallic,
            material.roughness
        );
        self.table.insert_material(HeadlessResource {
            label: material.name.clone(),
            size: [0, 0],
        })
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        self.release(handle.id(), ResourceKind::Material);
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        let size = [texture.width, texture.height];
        self.table.insert_texture(
            size,
            HeadlessResource {
                label: texture.label.clone(),
                size,
            },
        )
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.release(handle.id(), ResourceKind::Texture);
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle {
        let size = [desc.width, desc.height];
        self.table.insert_render_target(
            size,
            HeadlessResource {
                label: desc.label.clone(),
                size,
            },
        )
    }

    fn release_render_target(&mut self, handle: RenderTargetHandle) {
        self.release(handle.id(), ResourceKind::RenderTarget);
    }
}

impl RenderBackend for HeadlessBackend {
    fn execute(&mut self, pass: PassInvocation<'_>, scene: &SceneComposition) {
        let record = match pass {
            PassInvocation::Base { target } => {
                let mut meshes = 0;
                let mut triangles = 0;
                if let Some(model) = scene.model() {
                    model.visit(&mut |node, _| {
                        if let Some(mesh) = &node.mesh {
                            meshes += 1;
                            triangles += self.triangles.get(&mesh.geometry.id()).copied().unwrap_or(0);
                        }
                    });
                }
                self.camera_aspect = scene.camera.aspect();
                PassRecord::Base {
                    target: target.id(),
                    meshes,
                    triangles,
                    ambient: scene.ambient().intensity,
                    directional: scene.directional().intensity,
                    has_environment: scene.environment().is_some(),
                }
            }
            PassInvocation::Bloom { params, mips, .. } => PassRecord::Bloom {
                params,
                mips: mips.len(),
            },
        };
        self.recording.push(record);
    }

    fn present(&mut self, frame: &RenderTargetHandle) {
        self.presented += 1;
        self.last_frame = Some(FrameRecord {
            index: self.presented,
            presented: frame.id(),
            size: frame.size(),
            passes: std::mem::take(&mut self.recording),
            camera_aspect: self.camera_aspect,
        });
    }

    fn dispose(&mut self) -> usize {
        let leaked = self.table.drain();
        self.triangles.clear();
        if leaked > 0 {
            log::warn!("Headless backend disposed with {} live resources", leaked);
        }
        leaked
    }
}
