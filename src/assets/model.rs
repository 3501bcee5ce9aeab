use crate::scene::{Aabb, TextureSlotKind};
use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Parsed model, detached from any scene.
#[derive(Debug, Clone)]
pub struct ModelData {
    pub name: String,
    pub root: NodeData,
}

#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshData>,
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// Indexed triangle geometry. Each group draws a range of indices with the
/// material at the same position in `materials`.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub groups: Vec<PrimitiveGroup>,
    pub materials: Vec<MaterialData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveGroup {
    pub start: u32,
    pub count: u32,
    pub material: usize,
}

impl MeshData {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied().map(Vec3::from))
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone)]
pub struct MaterialData {
    pub name: String,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub textures: Vec<(TextureSlotKind, TextureData)>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            metallic: 1.0,
            roughness: 1.0,
            textures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub texels: Texels,
}

#[derive(Debug, Clone)]
pub enum Texels {
    Rgba8(Vec<u8>),
    RgbF32(Vec<[f32; 3]>),
}

impl TextureData {
    /// Mean linear colour of the texture, used as a flat tint by the painter.
    pub fn average_rgb(&self) -> [f32; 3] {
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        match &self.texels {
            Texels::Rgba8(bytes) => {
                for px in bytes.chunks_exact(4) {
                    for channel in 0..3 {
                        sum[channel] += srgb_to_linear(px[channel]) as f64;
                    }
                    count += 1;
                }
            }
            Texels::RgbF32(pixels) => {
                for px in pixels {
                    for channel in 0..3 {
                        sum[channel] += px[channel] as f64;
                    }
                    count += 1;
                }
            }
        }
        if count == 0 {
            return [1.0, 1.0, 1.0];
        }
        let n = count as f64;
        [
            (sum[0] / n) as f32,
            (sum[1] / n) as f32,
            (sum[2] / n) as f32,
        ]
    }
}

/// Parsed environment map (equirectangular, linear HDR).
#[derive(Debug, Clone)]
pub struct EnvironmentData {
    pub texture: TextureData,
}

pub fn srgb_to_linear(value: u8) -> f32 {
    let c = value as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }
}

#[cfg(test)]
impl NodeData {
    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: NodeData) -> Self {
        self.children.push(child);
        self
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeData::node_count).sum::<usize>()
    }
}

#[cfg(test)]
impl MeshData {
    /// Axis-aligned box spanning `min..max`, one material, 12 triangles.
    pub fn cuboid(min: [f32; 3], max: [f32; 3], material: MaterialData) -> Self {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([1.0, 0.0, 0.0], [[x1, y0, z0], [x1, y1, z0], [x1, y1, z1], [x1, y0, z1]]),
            ([-1.0, 0.0, 0.0], [[x0, y0, z1], [x0, y1, z1], [x0, y1, z0], [x0, y0, z0]]),
            ([0.0, 1.0, 0.0], [[x0, y1, z0], [x0, y1, z1], [x1, y1, z1], [x1, y1, z0]]),
            ([0.0, -1.0, 0.0], [[x0, y0, z1], [x0, y0, z0], [x1, y0, z0], [x1, y0, z1]]),
            ([0.0, 0.0, 1.0], [[x0, y0, z1], [x1, y0, z1], [x1, y1, z1], [x0, y1, z1]]),
            ([0.0, 0.0, -1.0], [[x1, y0, z0], [x0, y0, z0], [x0, y1, z0], [x1, y1, z0]]),
        ];
        let mut mesh = MeshData::default();
        for (normal, corners) in faces {
            let base = mesh.positions.len() as u32;
            mesh.positions.extend_from_slice(&corners);
            mesh.normals.extend_from_slice(&[normal; 4]);
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh.groups.push(PrimitiveGroup {
            start: 0,
            count: mesh.indices.len() as u32,
            material: 0,
        });
        mesh.materials.push(material);
        mesh
    }
}

#[cfg(test)]
impl MaterialData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_texture(mut self, kind: TextureSlotKind, texture: TextureData) -> Self {
        self.textures.push((kind, texture));
        self
    }
}

#[cfg(test)]
impl TextureData {
    pub fn solid_rgba8(label: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            texels: Texels::Rgba8(rgba.to_vec()),
        }
    }
}
