use arietta_ports::catalog::{CatalogDto, CatalogError, CatalogPort, PlayerSettings};
use std::fs;
use std::path::{Path, PathBuf};

/// Recording catalog and player settings on the local filesystem:
/// `catalog.json` ships with the application, `settings.json` is written back
/// on every change.
pub struct FsCatalog {
    base_dir: PathBuf,
}

impl FsCatalog {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, CatalogError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| CatalogError::Io("config dir not found".to_string()))?;
        Ok(base.join("Arietta"))
    }

    fn catalog_path(&self) -> PathBuf {
        self.base_dir.join("catalog.json")
    }

    fn settings_path(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
        let data = fs::read(path).map_err(|e| CatalogError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| CatalogError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| CatalogError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| CatalogError::Io(e.to_string()))
    }
}

impl Default for FsCatalog {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_dir }
    }
}

impl CatalogPort for FsCatalog {
    fn load_catalog(&self) -> Result<CatalogDto, CatalogError> {
        Self::read_json(&self.catalog_path())
    }

    /// Missing or unreadable settings fall back to defaults; a corrupt file
    /// must never block startup.
    fn load_settings(&self) -> Result<PlayerSettings, CatalogError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(PlayerSettings::default());
        }
        Self::read_json(&path)
    }

    fn save_settings(&self, s: &PlayerSettings) -> Result<(), CatalogError> {
        Self::write_json(&self.settings_path(), s)
    }
}
