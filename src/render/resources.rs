use crate::assets::model::{MaterialData, MeshData, TextureData};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Numeric id, for logs.
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
    RenderTarget,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Geometry,
        ResourceKind::Material,
        ResourceKind::Texture,
        ResourceKind::RenderTarget,
    ];
}

// Handles are not `Clone`: releasing one consumes it, so the same resource
// cannot be handed back to the backend twice.
#[derive(Debug, PartialEq, Eq)]
pub struct GeometryHandle {
    id: ResourceId,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MaterialHandle {
    id: ResourceId,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TextureHandle {
    id: ResourceId,
    size: [u32; 2],
}

#[derive(Debug, PartialEq, Eq)]
pub struct RenderTargetHandle {
    id: ResourceId,
    size: [u32; 2],
}

impl GeometryHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl MaterialHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl TextureHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }
}

impl RenderTargetHandle {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl RenderTargetDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Upload/release surface of a rendering backend.
pub trait GpuResources {
    fn upload_geometry(&mut self, mesh: &MeshData) -> GeometryHandle;
    fn release_geometry(&mut self, handle: GeometryHandle);
    fn create_material(&mut self, material: &MaterialData) -> MaterialHandle;
    fn release_material(&mut self, handle: MaterialHandle);
    fn upload_texture(&mut self, texture: &TextureData) -> TextureHandle;
    fn release_texture(&mut self, handle: TextureHandle);
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle;
    fn release_render_target(&mut self, handle: RenderTargetHandle);
}

/// Id allocation plus per-resource backend payload, shared by the backends.
pub struct ResourceTable<T> {
    next_id: u64,
    entries: HashMap<ResourceId, (ResourceKind, T)>,
    allocated: HashMap<ResourceKind, u64>,
    released: HashMap<ResourceKind, u64>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceTable<T> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
            allocated: HashMap::new(),
            released: HashMap::new(),
        }
    }

    fn insert(&mut self, kind: ResourceKind, payload: T) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, (kind, payload));
        *self.allocated.entry(kind).or_default() += 1;
        id
    }

    pub fn insert_geometry(&mut self, payload: T) -> GeometryHandle {
        GeometryHandle {
            id: self.insert(ResourceKind::Geometry, payload),
        }
    }

    pub fn insert_material(&mut self, payload: T) -> MaterialHandle {
        MaterialHandle {
            id: self.insert(ResourceKind::Material, payload),
        }
    }

    pub fn insert_texture(&mut self, size: [u32; 2], payload: T) -> TextureHandle {
        TextureHandle {
            id: self.insert(ResourceKind::Texture, payload),
            size,
        }
    }

    pub fn insert_render_target(&mut self, size: [u32; 2], payload: T) -> RenderTargetHandle {
        RenderTargetHandle {
            id: self.insert(ResourceKind::RenderTarget, payload),
            size,
        }
    }

    /// Removes the entry. An unknown id or a kind mismatch is an ownership bug
    /// upstream, never a runtime condition.
    pub fn remove(&mut self, id: ResourceId, kind: ResourceKind) -> Option<T> {
        match self.entries.remove(&id) {
            Some((stored, payload)) if stored == kind => {
                *self.released.entry(kind).or_default() += 1;
                Some(payload)
            }
            Some(entry) => {
                log::error!(
                    "release of {:?} as {:?} but it was allocated as {:?}",
                    id,
                    kind,
                    entry.0
                );
                self.entries.insert(id, entry);
                debug_assert!(false, "resource kind mismatch on release");
                None
            }
            None => {
                log::error!("release of unknown or already released {:?} ({:?})", id, kind);
                debug_assert!(false, "double release of GPU resource");
                None
            }
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&T> {
        self.entries.get(&id).map(|(_, payload)| payload)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &T)> + '_ {
        self.entries.values().map(|(kind, payload)| (*kind, payload))
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.entries.values().filter(|(k, _)| *k == kind).count()
    }

    pub fn live_total(&self) -> usize {
        self.entries.len()
    }

    pub fn allocated(&self, kind: ResourceKind) -> u64 {
        self.allocated.get(&kind).copied().unwrap_or(0)
    }

    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.released.get(&kind).copied().unwrap_or(0)
    }

    /// Drops every remaining entry, returning how many were still live.
    pub fn drain(&mut self) -> usize {
        let count = self.live_total();
        for (kind, _) in self.entries.values() {
            *self.released.entry(*kind).or_default() += 1;
        }
        self.entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::{ResourceKind, ResourceTable};

    #[test]
    fn table_counts_allocations_and_releases_per_kind() {
        let mut table = ResourceTable::<&'static str>::new();
        let geometry = table.insert_geometry("mesh");
        let texture = table.insert_texture([4, 4], "albedo");
        assert_eq!(table.live(ResourceKind::Geometry), 1);
        assert_eq!(table.live_total(), 2);
        assert_eq!(table.get(texture.id()), Some(&"albedo"));

        assert_eq!(table.remove(geometry.id(), ResourceKind::Geometry), Some("mesh"));
        assert_eq!(table.allocated(ResourceKind::Geometry), 1);
        assert_eq!(table.released(ResourceKind::Geometry), 1);
        assert_eq!(table.live(ResourceKind::Geometry), 0);
        assert_eq!(texture.size(), [4, 4]);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut table = ResourceTable::<()>::new();
        let first = table.insert_material(());
        let first_id = first.id();
        table.remove(first_id, ResourceKind::Material);
        let second = table.insert_material(());
        assert_ne!(first_id, second.id());
    }

    #[test]
    fn drain_reports_leftovers() {
        let mut table = ResourceTable::<()>::new();
        let _target = table.insert_render_target([8, 8], ());
        let _material = table.insert_material(());
        assert_eq!(table.drain(), 2);
        assert_eq!(table.live_total(), 0);
        assert_eq!(table.released(ResourceKind::RenderTarget), 1);
    }
}
