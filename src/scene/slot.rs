use super::dispose::dispose;
use super::node::SceneNode;
use super::SceneComposition;
use crate::assets::{AssetError, AssetLoaderAdapter, LoadToken, ModelCompletion};
use crate::render::resources::GpuResources;
use glam::Vec3;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Loading,
    Attached,
}

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("could not load model '{name}' from {}", .path.display())]
    Load {
        name: String,
        path: PathBuf,
        #[source]
        source: AssetError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The completion was the latest request and is now displayed.
    Attached { name: String },
    /// A newer request superseded this one; its resources were released.
    Discarded { token: LoadToken },
}

#[derive(Debug)]
struct PendingSwap {
    token: LoadToken,
    name: String,
}

/// Holds the single displayed model and decides which load may replace it.
///
/// Only the most recently issued token commits. Everything else that
/// completes is disposed without ever touching the scene.
#[derive(Debug)]
pub struct ModelSlot {
    display_scale: f32,
    last_token: Option<LoadToken>,
    pending: Option<PendingSwap>,
    attached_name: Option<String>,
}

impl ModelSlot {
    pub fn new(display_scale: f32) -> Self {
        Self {
            display_scale,
            last_token: None,
            pending: None,
            attached_name: None,
        }
    }

    pub fn state(&self) -> SlotState {
        if self.pending.is_some() {
            SlotState::Loading
        } else if self.attached_name.is_some() {
            SlotState::Attached
        } else {
            SlotState::Empty
        }
    }

    pub fn attached_name(&self) -> Option<&str> {
        self.attached_name.as_deref()
    }

    pub fn pending_name(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.name.as_str())
    }

    /// Requests `path` and makes it the only load allowed to commit.
    pub fn swap(&mut self, name: &str, path: &Path, loader: &mut AssetLoaderAdapter) -> LoadToken {
        let token = self
            .last_token
            .map(LoadToken::next)
            .unwrap_or_else(LoadToken::first);
        self.last_token = Some(token);
        if let Some(previous) = self.pending.replace(PendingSwap {
            token,
            name: name.to_string(),
        }) {
            log::debug!(
                "Model '{}' ({:?}) superseded by '{}'",
                previous.name,
                previous.token,
                name
            );
        }
        loader.load_model(token, name, path);
        token
    }

    /// Applies a finished load. Detach and dispose of the old model happen
    /// before the new one is attached, within this call.
    pub fn resolve(
        &mut self,
        completion: ModelCompletion,
        scene: &mut SceneComposition,
        gpu: &mut dyn GpuResources,
    ) -> Result<SwapOutcome, SlotError> {
        let ModelCompletion {
            token,
            name,
            path,
            result,
        } = completion;

        let is_latest = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.token == token);
        if !is_latest {
            match result {
                Ok(node) => {
                    let report = dispose(node, gpu);
                    log::debug!(
                        "Discarded stale model '{}' ({:?}); released {} geometries, {} materials, {} textures",
                        name,
                        token,
                        report.geometries,
                        report.materials,
                        report.textures
                    );
                }
                Err(err) => log::debug!("Stale load of '{}' failed: {}", name, err),
            }
            return Ok(SwapOutcome::Discarded { token });
        }
        self.pending = None;

        match result {
            Ok(mut node) => {
                if let Some(previous) = scene.detach_model() {
                    let report = dispose(previous, gpu);
                    log::debug!(
                        "Disposed '{}': {} nodes, {} geometries, {} materials, {} textures",
                        self.attached_name.as_deref().unwrap_or("model"),
                        report.nodes,
                        report.geometries,
                        report.materials,
                        report.textures
                    );
                }
                normalize(&mut node, self.display_scale);
                let size = node.world_bounds().size();
                scene.attach_model(node);
                self.attached_name = Some(name.clone());
                log::info!(
                    "Model '{}' attached from {} ({:.2} x {:.2} x {:.2})",
                    name,
                    path.display(),
                    size.x,
                    size.y,
                    size.z
                );
                Ok(SwapOutcome::Attached { name })
            }
            Err(source) => {
                log::warn!("Keeping current model; '{}' failed: {}", name, source);
                Err(SlotError::Load { name, path, source })
            }
        }
    }

    /// Disposes the displayed model. Loads still in flight will be discarded
    /// when they complete.
    pub fn clear(&mut self, scene: &mut SceneComposition, gpu: &mut dyn GpuResources) {
        self.pending = None;
        if let Some(node) = scene.detach_model() {
            let report = dispose(node, gpu);
            log::debug!(
                "Cleared model slot; released {} geometries, {} materials, {} textures",
                report.geometries,
                report.materials,
                report.textures
            );
        }
        self.attached_name = None;
    }
}

/// Scales the root uniformly, then shifts it so the world AABB is centred
/// on the origin. The bounds are measured after scaling.
pub fn normalize(node: &mut SceneNode, display_scale: f32) {
    node.transform.scale *= Vec3::splat(display_scale);
    let bounds = node.world_bounds();
    if bounds.is_empty() {
        return;
    }
    node.transform.translation -= bounds.center();
}
