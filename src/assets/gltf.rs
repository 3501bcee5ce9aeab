use super::model::{
    MaterialData, MeshData, ModelData, NodeData, PrimitiveGroup, TextureData, Texels, Transform,
};
use super::AssetError;
use crate::scene::TextureSlotKind;
use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::path::Path;

pub fn load_gltf(path: &Path) -> Result<ModelData, AssetError> {
    let display = path.display().to_string();
    if !path.exists() {
        return Err(AssetError::Read {
            path: display,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        });
    }
    let (document, buffers, images) =
        ::gltf::import(path).map_err(|err| AssetError::ParseGltf {
            path: display.clone(),
            message: err.to_string(),
        })?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::EmptyScene {
            path: display.clone(),
        })?;

    let name = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("gltf")
        .to_string();
    let context = ImportContext {
        buffers: &buffers,
        images: &images,
    };
    let mut root = NodeData::new(name.clone());
    for node in scene.nodes() {
        root.children.push(context.node(&node));
    }
    if root.children.is_empty() {
        return Err(AssetError::EmptyScene { path: display });
    }
    Ok(ModelData { name, root })
}

struct ImportContext<'a> {
    buffers: &'a [::gltf::buffer::Data],
    images: &'a [::gltf::image::Data],
}

impl ImportContext<'_> {
    fn node(&self, node: &::gltf::Node) -> NodeData {
        let (translation, rotation, scale) = node.transform().decomposed();
        let mut data = NodeData::new(
            node.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node{}", node.index())),
        )
        .with_transform(Transform {
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from(scale),
        });
        if let Some(mesh) = node.mesh() {
            data.mesh = self.mesh(&mesh);
        }
        for child in node.children() {
            data.children.push(self.node(&child));
        }
        data
    }

    fn mesh(&self, mesh: &::gltf::Mesh) -> Option<MeshData> {
        let mut out = MeshData::default();
        let mut material_slots: HashMap<Option<usize>, usize> = HashMap::new();

        for primitive in mesh.primitives() {
            if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                log::debug!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| {
                self.buffers.get(buffer.index()).map(|data| data.0.as_slice())
            });
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let base = out.positions.len() as u32;
            let positions: Vec<[f32; 3]> = positions.collect();
            let vertex_count = positions.len() as u32;
            out.positions.extend(positions);
            match reader.read_normals() {
                Some(normals) => out.normals.extend(normals),
                None => out
                    .normals
                    .extend(std::iter::repeat([0.0, 0.0, 0.0]).take(vertex_count as usize)),
            }

            let start = out.indices.len() as u32;
            match reader.read_indices() {
                Some(indices) => out
                    .indices
                    .extend(indices.into_u32().map(|index| base + index)),
                None => out.indices.extend(base..base + vertex_count),
            }
            let count = out.indices.len() as u32 - start;

            let material = primitive.material();
            let slot = *material_slots.entry(material.index()).or_insert_with(|| {
                out.materials.push(self.material(&material));
                out.materials.len() - 1
            });
            out.groups.push(PrimitiveGroup {
                start,
                count,
                material: slot,
            });
        }

        if out.groups.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn material(&self, material: &::gltf::Material) -> MaterialData {
        let pbr = material.pbr_metallic_roughness();
        let mut data = MaterialData {
            name: material.name().unwrap_or("material").to_string(),
            base_color: pbr.base_color_factor(),
            emissive: material.emissive_factor(),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            textures: Vec::new(),
        };
        let slots = [
            (
                TextureSlotKind::BaseColor,
                pbr.base_color_texture().map(|info| info.texture()),
            ),
            (
                TextureSlotKind::MetallicRoughness,
                pbr.metallic_roughness_texture().map(|info| info.texture()),
            ),
            (
                TextureSlotKind::Normal,
                material.normal_texture().map(|info| info.texture()),
            ),
            (
                TextureSlotKind::Occlusion,
                material.occlusion_texture().map(|info| info.texture()),
            ),
            (
                TextureSlotKind::Emissive,
                material.emissive_texture().map(|info| info.texture()),
            ),
        ];
        for (kind, texture) in slots {
            let Some(texture) = texture else {
                continue;
            };
            let image_index = texture.source().index();
            match self.images.get(image_index) {
                Some(image) => data.textures.push((kind, to_texture(image, image_index))),
                None => log::warn!("Material {:?} references missing image {}", data.name, image_index),
            }
        }
        data
    }
}

fn to_texture(image: &::gltf::image::Data, index: usize) -> TextureData {
    use ::gltf::image::Format;

    let pixel_count = (image.width * image.height) as usize;
    let rgba = match image.format {
        Format::R8G8B8A8 => image.pixels.clone(),
        Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect(),
        Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[1], 0, 255])
            .collect(),
        Format::R8 => image
            .pixels
            .iter()
            .flat_map(|&value| [value, value, value, 255])
            .collect(),
        other => {
            log::debug!("Image {} uses {:?}; substituting white", index, other);
            std::iter::repeat([255u8; 4]).take(pixel_count).flatten().collect()
        }
    };
    TextureData {
        label: format!("image{}", index),
        width: image.width,
        height: image.height,
        texels: Texels::Rgba8(rgba),
    }
}

#[cfg(test)]
mod tests {
    use super::load_gltf;
    use crate::assets::AssetError;
    use std::path::Path;

    #[test]
    fn missing_file_is_a_read_error() {
        match load_gltf(Path::new("does/not/exist.glb")) {
            Err(AssetError::Read { path, .. }) => assert!(path.ends_with("exist.glb")),
            other => panic!("expected read error, got {:?}", other.map(|m| m.name)),
        }
    }

    #[test]
    fn minimal_embedded_triangle_imports() {
        // One triangle, positions in a base64 data URI buffer.
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "tri", "mesh": 0, "translation": [1.0, 0.0, 0.0]}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "buffers": [{"byteLength": 36, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"}],
            "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
            "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                           "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}]
        }"#;
        let mut path = std::env::temp_dir();
        path.push(format!("showroom_triangle_{}.gltf", std::process::id()));
        std::fs::write(&path, json).unwrap();

        let model = load_gltf(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(model.root.children.len(), 1);
        let node = &model.root.children[0];
        assert_eq!(node.name, "tri");
        assert_eq!(node.transform.translation.x, 1.0);
        let mesh = node.mesh.as_ref().unwrap();
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.groups.len(), 1);
        assert_eq!(mesh.materials.len(), 1);
    }
}
