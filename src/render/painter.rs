use super::camera::project_with;
use super::pipeline::BloomParams;
use super::resources::{
    GeometryHandle, GpuResources, MaterialHandle, RenderTargetDesc, RenderTargetHandle,
    ResourceId, ResourceKind, ResourceTable, TextureHandle,
};
use super::{PassInvocation, RenderBackend};
use crate::assets::model::{MaterialData, MeshData, TextureData, Texels};
use crate::scene::{SceneComposition, TextureSlotKind};
use egui::{Color32, ColorImage, Mesh, Pos2, Rect, Shape, TextureOptions};
use glam::{Mat4, Vec3};
use std::f32::consts::PI;

const ENVIRONMENT_WEIGHT: f32 = 1.0;
const GLOW_LAYERS: usize = 2;

struct PaintGeometry {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
}

#[derive(Clone, Copy)]
struct PaintMaterial {
    albedo: Vec3,
    emissive: Vec3,
}

impl PaintMaterial {
    const UNBOUND: PaintMaterial = PaintMaterial {
        albedo: Vec3::splat(0.8),
        emissive: Vec3::ZERO,
    };
}

struct PaintTexture {
    average: Vec3,
    image: Option<egui::TextureHandle>,
}

enum PaintResource {
    Geometry(PaintGeometry),
    Material(PaintMaterial),
    Texture(PaintTexture),
    RenderTarget,
}

#[derive(Clone, Copy, Debug)]
struct PaintTriangle {
    /// Normalized viewport coordinates, origin top-left.
    points: [Pos2; 3],
    depth: f32,
    color: Vec3,
}

#[derive(Clone, Copy, Debug)]
struct Backdrop {
    texture: egui::TextureId,
    uv: Rect,
}

/// Triangles and backdrop of one frame, in paint order.
#[derive(Default, Debug)]
struct PaintedFrame {
    triangles: Vec<PaintTriangle>,
    glow: Vec<PaintTriangle>,
    backdrop: Option<Backdrop>,
}

/// CPU backend that projects the scene into egui meshes. Triangles are
/// flat-shaded from the scene lights and an environment tint, depth-sorted
/// back to front, and bloom adds additive halos around bright ones.
pub struct PainterBackend {
    ctx: egui::Context,
    table: ResourceTable<PaintResource>,
    building: PaintedFrame,
    presented: PaintedFrame,
}

impl PainterBackend {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            table: ResourceTable::new(),
            building: PaintedFrame::default(),
            presented: PaintedFrame::default(),
        }
    }

    /// Draws the last presented frame into `rect`.
    pub fn paint(&self, painter: &egui::Painter, rect: Rect) {
        match self.presented.backdrop {
            Some(backdrop) => {
                painter.image(backdrop.texture, rect, backdrop.uv, Color32::WHITE);
            }
            None => {
                painter.rect_filled(rect, 0.0, Color32::from_gray(24));
            }
        }
        for (triangles, additive) in [(&self.presented.triangles, false), (&self.presented.glow, true)] {
            if triangles.is_empty() {
                continue;
            }
            let mut mesh = Mesh::default();
            for triangle in triangles {
                let color = to_color32(triangle.color, additive);
                let base = mesh.vertices.len() as u32;
                for point in triangle.points {
                    mesh.colored_vertex(rect.min + point.to_vec2() * rect.size(), color);
                }
                mesh.add_triangle(base, base + 1, base + 2);
            }
            painter.add(Shape::mesh(mesh));
        }
    }

    fn material(&self, id: ResourceId) -> PaintMaterial {
        match self.table.get(id) {
            Some(PaintResource::Material(material)) => *material,
            _ => PaintMaterial::UNBOUND,
        }
    }

    fn environment_tint(&self, scene: &SceneComposition) -> Vec3 {
        match scene.environment().and_then(|texture| self.table.get(texture.id())) {
            Some(PaintResource::Texture(texture)) => texture.average,
            _ => Vec3::ZERO,
        }
    }

    fn draw_base(&mut self, scene: &SceneComposition) {
        let camera = &scene.camera;
        let view_projection = camera.view_projection();
        let eye = camera.position;
        let ambient = Vec3::from(scene.ambient().color) * scene.ambient().intensity;
        let directional = scene.directional();
        let light_dir = directional.direction_to_light();
        let light = Vec3::from(directional.color) * directional.intensity;
        let environment = self.environment_tint(scene) * ENVIRONMENT_WEIGHT;

        self.building.backdrop = scene
            .environment()
            .and_then(|texture| match self.table.get(texture.id()) {
                Some(PaintResource::Texture(PaintTexture {
                    image: Some(image), ..
                })) => Some(Backdrop {
                    texture: image.id(),
                    uv: backdrop_uv(scene),
                }),
                _ => None,
            });

        let mut triangles = Vec::new();
        if let Some(model) = scene.model() {
            model.visit(&mut |node, world: &Mat4| {
                let Some(binding) = &node.mesh else {
                    return;
                };
                let Some(PaintResource::Geometry(geometry)) = self.table.get(binding.geometry.id())
                else {
                    return;
                };
                let world_positions: Vec<Vec3> = geometry
                    .positions
                    .iter()
                    .map(|p| world.transform_point3(*p))
                    .collect();
                for group in &binding.groups {
                    let material = binding
                        .materials
                        .as_ref()
                        .and_then(|set| set.get(group.material))
                        .map(|record| self.material(record.handle.id()))
                        .unwrap_or(PaintMaterial::UNBOUND);
                    let end = (group.start as usize + group.count as usize).min(geometry.indices.len());
                    let start = (group.start as usize).min(end);
                    for tri in geometry.indices[start..end].chunks_exact(3) {
                        let (Some(a), Some(b), Some(c)) = (
                            world_positions.get(tri[0] as usize),
                            world_positions.get(tri[1] as usize),
                            world_positions.get(tri[2] as usize),
                        ) else {
                            continue;
                        };
                        let corners = [*a, *b, *c];
                        let mut projected = [Vec3::ZERO; 3];
                        let mut visible = true;
                        for (slot, corner) in projected.iter_mut().zip(corners) {
                            match project_with(&view_projection, corner, [1.0, 1.0]) {
                                Some(point) => *slot = point,
                                None => visible = false,
                            }
                        }
                        if !visible {
                            continue;
                        }
                        let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
                        let mut normal = (corners[1] - corners[0])
                            .cross(corners[2] - corners[0])
                            .normalize_or_zero();
                        if normal.dot(eye - centroid) < 0.0 {
                            normal = -normal;
                        }
                        let sky = 0.5 + 0.5 * normal.y;
                        let irradiance =
                            ambient + light * normal.dot(light_dir).max(0.0) + environment * sky;
                        triangles.push(PaintTriangle {
                            points: projected.map(|p| Pos2::new(p.x, p.y)),
                            depth: (projected[0].z + projected[1].z + projected[2].z) / 3.0,
                            color: material.albedo * irradiance + material.emissive,
                        });
                    }
                }
            });
        }
        triangles.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        self.building.triangles = triangles;
    }

    fn draw_bloom(&mut self, params: &BloomParams) {
        self.building.glow.clear();
        if params.strength <= 0.0 {
            return;
        }
        for triangle in &self.building.triangles {
            let luminance = luminance(triangle.color);
            if luminance <= params.threshold || luminance <= 0.0 {
                continue;
            }
            let excess = (luminance - params.threshold) / luminance;
            let center = Pos2::new(
                (triangle.points[0].x + triangle.points[1].x + triangle.points[2].x) / 3.0,
                (triangle.points[0].y + triangle.points[1].y + triangle.points[2].y) / 3.0,
            );
            for layer in 1..=GLOW_LAYERS {
                let spread = 1.0 + params.radius * layer as f32;
                let falloff = params.strength * excess / layer as f32;
                self.building.glow.push(PaintTriangle {
                    points: triangle
                        .points
                        .map(|p| center + (p - center) * spread),
                    depth: triangle.depth,
                    color: triangle.color * falloff,
                });
            }
        }
    }
}

fn luminance(color: Vec3) -> f32 {
    color.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

fn to_color32(color: Vec3, additive: bool) -> Color32 {
    let c = color.clamp(Vec3::ZERO, Vec3::ONE);
    let rgba = egui::Rgba::from_rgb(c.x, c.y, c.z);
    let srgb = Color32::from(rgba);
    if additive {
        Color32::from_rgba_premultiplied(srgb.r(), srgb.g(), srgb.b(), 0)
    } else {
        srgb
    }
}

/// Slice of the equirectangular backdrop seen through the camera frustum.
fn backdrop_uv(scene: &SceneComposition) -> Rect {
    let camera = &scene.camera;
    let fov_y = camera.fov_y_deg().to_radians();
    let fov_x = 2.0 * ((fov_y * 0.5).tan() * camera.aspect()).atan();
    let offset = (camera.position - camera.target).normalize_or_zero();
    let u_center = 0.5 - camera.azimuth() / (2.0 * PI);
    let v_center = 0.5 + offset.y.clamp(-1.0, 1.0).asin() / PI;
    let half_u = fov_x / (4.0 * PI);
    let half_v = fov_y / (2.0 * PI);
    Rect::from_min_max(
        Pos2::new(u_center - half_u, (v_center - half_v).clamp(0.0, 1.0)),
        Pos2::new(u_center + half_u, (v_center + half_v).clamp(0.0, 1.0)),
    )
}

fn tone_map(value: f32) -> u8 {
    let mapped = value.max(0.0) / (1.0 + value.max(0.0));
    (mapped.powf(1.0 / 2.2) * 255.0).round().clamp(0.0, 255.0) as u8
}

fn material_tint(material: &MaterialData, kind: TextureSlotKind) -> Vec3 {
    material
        .textures
        .iter()
        .find(|(slot, _)| *slot == kind)
        .map(|(_, texture)| Vec3::from(texture.average_rgb()))
        .unwrap_or(Vec3::ONE)
}

impl GpuResources for PainterBackend {
    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryHandle {
        self.table
            .insert_geometry(PaintResource::Geometry(PaintGeometry {
                positions: mesh.positions.iter().copied().map(Vec3::from).collect(),
                indices: mesh.indices.clone(),
            }))
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        self.table.remove(handle.id(), ResourceKind::Geometry);
    }

    fn create_material(&mut self, material: &MaterialData) -> MaterialHandle {
        let base = material.base_color;
        let albedo = Vec3::new(base[0], base[1], base[2])
            * material_tint(material, TextureSlotKind::BaseColor);
        let emissive =
            Vec3::from(material.emissive) * material_tint(material, TextureSlotKind::Emissive);
        self.table
            .insert_material(PaintResource::Material(PaintMaterial { albedo, emissive }))
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        self.table.remove(handle.id(), ResourceKind::Material);
    }

    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle {
        let image = match &texture.texels {
            Texels::RgbF32(pixels) => {
                let bytes: Vec<u8> = pixels
                    .iter()
                    .flat_map(|px| [tone_map(px[0]), tone_map(px[1]), tone_map(px[2]), 255])
                    .collect();
                let color_image = ColorImage::from_rgba_unmultiplied(
                    [texture.width as usize, texture.height as usize],
                    &bytes,
                );
                Some(self.ctx.load_texture(
                    texture.label.clone(),
                    color_image,
                    TextureOptions::LINEAR_REPEAT,
                ))
            }
            Texels::Rgba8(_) => None,
        };
        self.table.insert_texture(
            [texture.width, texture.height],
            PaintResource::Texture(PaintTexture {
                average: Vec3::from(texture.average_rgb()),
                image,
            }),
        )
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.table.remove(handle.id(), ResourceKind::Texture);
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle {
        self.table
            .insert_render_target([desc.width, desc.height], PaintResource::RenderTarget)
    }

    fn release_render_target(&mut self, handle: RenderTargetHandle) {
        self.table.remove(handle.id(), ResourceKind::RenderTarget);
    }
}

impl RenderBackend for PainterBackend {
    fn execute(&mut self, pass: PassInvocation<'_>, scene: &SceneComposition) {
        match pass {
            PassInvocation::Base { .. } => self.draw_base(scene),
            PassInvocation::Bloom { params, .. } => self.draw_bloom(&params),
        }
    }

    fn present(&mut self, _frame: &RenderTargetHandle) {
        self.presented = std::mem::take(&mut self.building);
    }

    fn dispose(&mut self) -> usize {
        self.building = PaintedFrame::default();
        self.presented = PaintedFrame::default();
        let leaked = self.table.drain();
        if leaked > 0 {
            log::warn!("Painter backend disposed with {} live resources", leaked);
        }
        leaked
    }
}
