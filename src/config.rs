use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model catalog is empty")]
    EmptyCatalog,
    #[error("model '{0}' appears more than once in the catalog")]
    DuplicateModel(String),
    #[error("model '{0}' has an empty path")]
    EmptyModelPath(String),
    #[error("default model '{0}' is not in the catalog")]
    UnknownDefault(String),
    #[error("display scale must be positive and finite, got {0}")]
    InvalidScale(f32),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub path: PathBuf,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_y_deg: 80.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 5.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// sRGB hex colour, e.g. `0x404040`.
    pub ambient_color: u32,
    pub ambient_intensity: f32,
    pub directional_color: u32,
    pub directional_intensity: f32,
    pub directional_position: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            ambient_color: 0x404040,
            ambient_intensity: 1.0,
            directional_color: 0xffffff,
            directional_intensity: 0.0,
            directional_position: [5.0, 10.0, 7.5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 0.0,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset_root: PathBuf,
    pub catalog: Vec<CatalogEntry>,
    pub default_model: String,
    pub environment: PathBuf,
    pub display_scale: f32,
    pub camera: CameraSettings,
    pub lights: LightSettings,
    pub bloom: BloomSettings,
    pub orbit_damping: f32,
    pub window_size: [u32; 2],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            catalog: vec![
                CatalogEntry::new("Dunk", "models/basket.glb"),
                CatalogEntry::new("Jordan", "models/jordan.glb"),
            ],
            default_model: "Dunk".to_string(),
            environment: PathBuf::from("envmaps/studio.hdr"),
            display_scale: 2.0,
            camera: CameraSettings::default(),
            lights: LightSettings::default(),
            bloom: BloomSettings::default(),
            orbit_damping: 0.05,
            window_size: [1280, 720],
        }
    }
}

impl ViewerConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateModel(entry.name.clone()));
            }
            if entry.path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyModelPath(entry.name.clone()));
            }
        }
        if !seen.contains(self.default_model.as_str()) {
            return Err(ConfigError::UnknownDefault(self.default_model.clone()));
        }
        if !self.display_scale.is_finite() || self.display_scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.display_scale));
        }
        Ok(())
    }
}

/// Converts a `0xRRGGBB` sRGB colour to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| crate::assets::model::srgb_to_linear(((hex >> shift) & 0xff) as u8);
    [channel(16), channel(8), channel(0)]
}

#[cfg(test)]
mod tests {
    use super::{hex_to_linear, CatalogEntry, ConfigError, ViewerConfig};

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("showroom_config_{}_{}", std::process::id(), name));
        path
    }

    #[test]
    fn defaults_describe_the_two_model_showroom() {
        let config = ViewerConfig::default();
        config.validate().unwrap();
        let names: Vec<&str> = config.catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Dunk", "Jordan"]);
        assert_eq!(config.catalog[1].path.to_str(), Some("models/jordan.glb"));
        assert_eq!(config.display_scale, 2.0);
        assert_eq!(config.bloom.threshold, 0.85);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{ "default_model": "Dunk", "bloom": { "strength": 1.0 } }"#;
        let config: ViewerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bloom.strength, 1.0);
        assert_eq!(config.bloom.radius, 0.4);
        assert_eq!(config.catalog.len(), 2);
    }

    #[test]
    fn save_then_load_keeps_catalog_order() {
        let path = temp_path("roundtrip.json");
        let mut config = ViewerConfig::default();
        config.catalog.push(CatalogEntry::new("Air", "models/air.glb"));
        config.save(&path).unwrap();
        let loaded = ViewerConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = ViewerConfig::load_or_default(&temp_path("absent.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn validation_rejects_bad_catalogs() {
        let mut config = ViewerConfig::default();
        config.catalog.push(CatalogEntry::new("Dunk", "models/other.glb"));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateModel(name)) if name == "Dunk"));

        let mut config = ViewerConfig::default();
        config.default_model = "Air".into();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownDefault(_))));

        let mut config = ViewerConfig::default();
        config.catalog[1].path = "".into();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyModelPath(_))));

        let mut config = ViewerConfig::default();
        config.catalog.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCatalog)));
    }

    #[test]
    fn hex_colours_convert_to_linear() {
        assert_eq!(hex_to_linear(0xffffff), [1.0, 1.0, 1.0]);
        let grey = hex_to_linear(0x404040);
        assert!((grey[0] - 0.0513).abs() < 1e-3);
    }
}
