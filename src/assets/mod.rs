mod environment;
mod gltf;
pub mod model;

use crate::render::resources::{GpuResources, TextureHandle};
use crate::scene::SceneNode;
use model::{EnvironmentData, ModelData};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse glTF {path}: {message}")]
    ParseGltf { path: String, message: String },
    #[error("failed to decode environment map {path}: {message}")]
    DecodeImage { path: String, message: String },
    #[error("unsupported asset format: {path}")]
    UnsupportedFormat { path: String },
    #[error("glTF {path} has no scene to display")]
    EmptyScene { path: String },
    #[error("loader for {path} stopped without a result")]
    WorkerLost { path: String },
}

/// Parser for model and environment files. Called on loader threads.
pub trait AssetSource: Send + Sync + 'static {
    fn load_model(&self, path: &Path) -> Result<ModelData, AssetError>;
    fn load_environment(&self, path: &Path) -> Result<EnvironmentData, AssetError>;
}

/// Reads assets from disk, resolving relative paths against `root`.
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetSource for FileAssetSource {
    fn load_model(&self, path: &Path) -> Result<ModelData, AssetError> {
        let full = self.resolve(path);
        match extension_of(&full).as_deref() {
            Some("glb") | Some("gltf") => gltf::load_gltf(&full),
            _ => Err(AssetError::UnsupportedFormat {
                path: full.display().to_string(),
            }),
        }
    }

    fn load_environment(&self, path: &Path) -> Result<EnvironmentData, AssetError> {
        let full = self.resolve(path);
        match extension_of(&full).as_deref() {
            Some("hdr") | Some("png") | Some("jpg") | Some("jpeg") => {
                environment::load_equirect(&full)
            }
            _ => Err(AssetError::UnsupportedFormat {
                path: full.display().to_string(),
            }),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Identifies one model request; only the newest one issued by a slot commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn first() -> Self {
        LoadToken(1)
    }

    pub fn next(self) -> Self {
        LoadToken(self.0 + 1)
    }
}

pub struct ModelCompletion {
    pub token: LoadToken,
    pub name: String,
    pub path: PathBuf,
    pub result: Result<SceneNode, AssetError>,
}

pub struct EnvironmentCompletion {
    pub path: PathBuf,
    pub result: Result<TextureHandle, AssetError>,
}

pub enum LoadCompletion {
    Model(ModelCompletion),
    Environment(EnvironmentCompletion),
}

enum WorkerResult {
    Model {
        token: LoadToken,
        name: String,
        path: PathBuf,
        result: Result<ModelData, AssetError>,
    },
    Environment {
        path: PathBuf,
        result: Result<EnvironmentData, AssetError>,
    },
}

/// Runs each load on its own thread and hands results back to the frame
/// thread, where they are uploaded to the GPU.
pub struct AssetLoaderAdapter {
    source: Arc<dyn AssetSource>,
    tx: Sender<WorkerResult>,
    rx: Receiver<WorkerResult>,
    in_flight: usize,
}

impl AssetLoaderAdapter {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        let (tx, rx) = channel();
        Self {
            source,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn load_model(&mut self, token: LoadToken, name: &str, path: &Path) {
        debug_assert!(!path.as_os_str().is_empty(), "model path must not be empty");
        log::info!("Loading model '{}' from {} ({:?})", name, path.display(), token);
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let name_owned = name.to_string();
        let path_owned = path.to_path_buf();
        self.spawn(format!("load-model-{}", name), path, move || {
            let result = run_guarded(&path_owned, || source.load_model(&path_owned));
            let _ = tx.send(WorkerResult::Model {
                token,
                name: name_owned,
                path: path_owned,
                result,
            });
        }, |path| WorkerResult::Model {
            token,
            name: name.to_string(),
            path: path.to_path_buf(),
            result: Err(AssetError::WorkerLost {
                path: path.display().to_string(),
            }),
        });
    }

    pub fn load_environment(&mut self, path: &Path) {
        log::info!("Loading environment map {}", path.display());
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let path_owned = path.to_path_buf();
        self.spawn("load-environment".to_string(), path, move || {
            let result = run_guarded(&path_owned, || source.load_environment(&path_owned));
            let _ = tx.send(WorkerResult::Environment {
                path: path_owned,
                result,
            });
        }, |path| WorkerResult::Environment {
            path: path.to_path_buf(),
            result: Err(AssetError::WorkerLost {
                path: path.display().to_string(),
            }),
        });
    }

    fn spawn<F, E>(&mut self, thread_name: String, path: &Path, job: F, on_spawn_error: E)
    where
        F: FnOnce() + Send + 'static,
        E: FnOnce(&Path) -> WorkerResult,
    {
        self.in_flight += 1;
        if let Err(err) = thread::Builder::new().name(thread_name).spawn(job) {
            log::error!("Failed to start loader thread for {}: {}", path.display(), err);
            let _ = self.tx.send(on_spawn_error(path));
        }
    }

    /// Non-blocking. Uploads a finished load and returns it.
    pub fn poll(&mut self, gpu: &mut dyn GpuResources) -> Option<LoadCompletion> {
        let result = self.rx.try_recv().ok()?;
        Some(self.finish(result, gpu))
    }

    /// Blocks up to `timeout` for the next finished load.
    pub fn wait(&mut self, gpu: &mut dyn GpuResources, timeout: Duration) -> Option<LoadCompletion> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(self.finish(result, gpu)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn finish(&mut self, result: WorkerResult, gpu: &mut dyn GpuResources) -> LoadCompletion {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            WorkerResult::Model {
                token,
                name,
                path,
                result,
            } => {
                let result = result.map(|model| {
                    let node = SceneNode::upload(model.root, gpu);
                    log::debug!(
                        "Uploaded '{}': {} nodes, {} meshes",
                        model.name,
                        node.node_count(),
                        node.mesh_count()
                    );
                    node
                });
                LoadCompletion::Model(ModelCompletion {
                    token,
                    name,
                    path,
                    result,
                })
            }
            WorkerResult::Environment { path, result } => LoadCompletion::Environment(
                EnvironmentCompletion {
                    path,
                    result: result.map(|environment| gpu.upload_texture(&environment.texture)),
                },
            ),
        }
    }
}

fn run_guarded<T, F>(path: &Path, load: F) -> Result<T, AssetError>
where
    F: FnOnce() -> Result<T, AssetError>,
{
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(result) => result,
        Err(_) => {
            log::error!("Loader panicked while reading {}", path.display());
            Err(AssetError::WorkerLost {
                path: path.display().to_string(),
            })
        }
    }
}
