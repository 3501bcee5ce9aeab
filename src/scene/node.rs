use super::bounds::Aabb;
use crate::assets::model::{MeshData, NodeData, PrimitiveGroup, Transform};
use crate::render::resources::{GeometryHandle, GpuResources, MaterialHandle, TextureHandle};
use glam::Mat4;

/// Which material input a texture is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlotKind {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

#[derive(Debug)]
pub struct TextureSlot {
    pub kind: TextureSlotKind,
    pub texture: TextureHandle,
}

#[derive(Debug)]
pub struct MaterialRecord {
    pub name: String,
    pub handle: MaterialHandle,
    pub slots: Vec<TextureSlot>,
}

#[derive(Debug)]
pub enum MaterialSet {
    Single(MaterialRecord),
    Multi(Vec<MaterialRecord>),
}

impl MaterialSet {
    pub fn get(&self, index: usize) -> Option<&MaterialRecord> {
        match self {
            MaterialSet::Single(record) if index == 0 => Some(record),
            MaterialSet::Single(_) => None,
            MaterialSet::Multi(records) => records.get(index),
        }
    }
}

#[derive(Debug)]
pub struct MeshBinding {
    pub geometry: GeometryHandle,
    pub materials: Option<MaterialSet>,
    pub groups: Vec<PrimitiveGroup>,
    pub local_bounds: Aabb,
}

/// Node of a loaded model, carrying GPU handles.
///
/// Released only through [`dispose`](super::dispose::dispose), which consumes it.
#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshBinding>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Uploads every mesh, material and texture of `data` and returns the
    /// detached root.
    pub fn upload(data: NodeData, gpu: &mut dyn GpuResources) -> SceneNode {
        let NodeData {
            name,
            transform,
            mesh,
            children,
        } = data;
        SceneNode {
            name,
            transform,
            mesh: mesh.map(|mesh| upload_mesh(mesh, gpu)),
            children: children
                .into_iter()
                .map(|child| SceneNode::upload(child, gpu))
                .collect(),
        }
    }

    pub fn world_bounds(&self) -> Aabb {
        self.bounds_under(Mat4::IDENTITY)
    }

    fn bounds_under(&self, parent: Mat4) -> Aabb {
        let world = parent * self.transform.matrix();
        let mut bounds = Aabb::empty();
        if let Some(mesh) = &self.mesh {
            bounds.merge(&mesh.local_bounds.transformed(&world));
        }
        for child in &self.children {
            bounds.merge(&child.bounds_under(world));
        }
        bounds
    }

    /// Depth-first visit with each node's world matrix.
    pub fn visit<F>(&self, visitor: &mut F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        self.visit_under(Mat4::IDENTITY, visitor);
    }

    fn visit_under<F>(&self, parent: Mat4, visitor: &mut F)
    where
        F: FnMut(&SceneNode, &Mat4),
    {
        let world = parent * self.transform.matrix();
        visitor(self, &world);
        for child in &self.children {
            child.visit_under(world, visitor);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node, _| {
            if node.mesh.is_some() {
                count += 1;
            }
        });
        count
    }
}

fn upload_mesh(mesh: MeshData, gpu: &mut dyn GpuResources) -> MeshBinding {
    let geometry = gpu.upload_geometry(&mesh);
    let local_bounds = mesh.bounds();
    let mut records: Vec<MaterialRecord> = mesh
        .materials
        .iter()
        .map(|material| MaterialRecord {
            name: material.name.clone(),
            handle: gpu.create_material(material),
            slots: material
                .textures
                .iter()
                .map(|(kind, texture)| TextureSlot {
                    kind: *kind,
                    texture: gpu.upload_texture(texture),
                })
                .collect(),
        })
        .collect();
    let materials = match records.len() {
        0 => None,
        1 => records.pop().map(MaterialSet::Single),
        _ => Some(MaterialSet::Multi(records)),
    };
    MeshBinding {
        geometry,
        materials,
        groups: mesh.groups,
        local_bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::{MaterialSet, SceneNode, TextureSlotKind};
    use crate::assets::model::{MaterialData, MeshData, NodeData, TextureData, Transform};
    use crate::render::headless::HeadlessBackend;
    use crate::render::resources::ResourceKind;
    use glam::Vec3;

    #[test]
    fn upload_creates_one_resource_per_mesh_material_and_slot() {
        let mut gpu = HeadlessBackend::new();
        let material = MaterialData::named("leather")
            .with_texture(TextureSlotKind::BaseColor, TextureData::solid_rgba8("albedo", [200, 10, 10, 255]))
            .with_texture(TextureSlotKind::Normal, TextureData::solid_rgba8("normal", [128, 128, 255, 255]));
        let mut mesh = MeshData::cuboid([0.0; 3], [1.0; 3], material);
        mesh.materials.push(MaterialData::named("sole"));
        let data = NodeData::new("shoe").with_mesh(mesh);

        let node = SceneNode::upload(data, &mut gpu);
        let ledger = gpu.ledger();
        assert_eq!(ledger.live(ResourceKind::Geometry), 1);
        assert_eq!(ledger.live(ResourceKind::Material), 2);
        assert_eq!(ledger.live(ResourceKind::Texture), 2);

        let binding = node.mesh.as_ref().expect("mesh binding");
        match binding.materials.as_ref() {
            Some(MaterialSet::Multi(records)) => {
                assert_eq!(records.len(), 2);
                assert!(records[0].slots.iter().any(|slot| slot.kind == TextureSlotKind::Normal));
                assert!(records[1].slots.iter().all(|slot| slot.kind != TextureSlotKind::BaseColor));
            }
            other => panic!("expected two materials, got {other:?}"),
        }
        crate::scene::dispose::dispose(node, &mut gpu);
    }

    #[test]
    fn world_bounds_follow_nested_transforms() {
        let mut gpu = HeadlessBackend::new();
        let child = NodeData::new("child")
            .with_transform(Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)))
            .with_mesh(MeshData::cuboid([-1.0; 3], [1.0; 3], MaterialData::default()));
        let root = NodeData::new("root")
            .with_transform(Transform {
                scale: Vec3::splat(2.0),
                ..Transform::IDENTITY
            })
            .with_child(child);

        let node = SceneNode::upload(root, &mut gpu);
        let bounds = node.world_bounds();
        assert!((bounds.center() - Vec3::new(20.0, 0.0, 0.0)).length() < 1e-5);
        assert!((bounds.size() - Vec3::splat(4.0)).length() < 1e-5);
        assert_eq!(node.node_count(), 2);
        assert_eq!(node.mesh_count(), 1);
        crate::scene::dispose::dispose(node, &mut gpu);
    }
}
