use super::node::{MaterialRecord, MaterialSet, SceneNode};
use crate::render::resources::GpuResources;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisposeReport {
    pub nodes: usize,
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Consumes `node` and releases its geometry, materials and every texture
/// bound to a material slot, for the whole subtree.
pub fn dispose(node: SceneNode, gpu: &mut dyn GpuResources) -> DisposeReport {
    let mut report = DisposeReport::default();
    walk(node, gpu, &mut report);
    report
}

fn walk(node: SceneNode, gpu: &mut dyn GpuResources, report: &mut DisposeReport) {
    let SceneNode { mesh, children, .. } = node;
    report.nodes += 1;
    if let Some(mesh) = mesh {
        gpu.release_geometry(mesh.geometry);
        report.geometries += 1;
        match mesh.materials {
            Some(MaterialSet::Single(record)) => release_material(record, gpu, report),
            Some(MaterialSet::Multi(records)) => {
                for record in records {
                    release_material(record, gpu, report);
                }
            }
            None => {}
        }
    }
    for child in children {
        walk(child, gpu, report);
    }
}

fn release_material(record: MaterialRecord, gpu: &mut dyn GpuResources, report: &mut DisposeReport) {
    gpu.release_material(record.handle);
    report.materials += 1;
    for slot in record.slots {
        log::trace!("Releasing {:?} texture of material '{}'", slot.kind, record.name);
        gpu.release_texture(slot.texture);
        report.textures += 1;
    }
}
