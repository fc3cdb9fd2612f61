//! Application configuration
//!
//! JSON file with every field optional; missing fields take their defaults.
//!
//! ```json
//! {
//!   "model_path": "models/best_model.mpk",
//!   "device": "auto",
//!   "collections_root": "collections",
//!   "include_confidence_in_filename": true
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::DevicePreference;
use crate::collection::{CollectionStore, FilenameTemplate};
use crate::inference::{PredictorConfig, PreprocessConfig};
use crate::utils::error::{MpoxError, Result};
use crate::utils::logging::LogLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weight file produced by `mpox train`
    pub model_path: PathBuf,

    pub device: DevicePreference,

    /// Side length of the network input
    pub image_size: usize,

    /// Root of the per-label collection directories
    pub collections_root: PathBuf,

    pub include_confidence_in_filename: bool,

    pub filename_prefix: Option<String>,

    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/best_model.mpk"),
            device: DevicePreference::Auto,
            image_size: crate::IMAGE_SIZE,
            collections_root: PathBuf::from("collections"),
            include_confidence_in_filename: true,
            filename_prefix: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MpoxError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MpoxError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the given file, or fall back to defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_size < 32 {
            return Err(MpoxError::Config(format!(
                "image_size must be at least 32, got {}",
                self.image_size
            )));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(MpoxError::Config("model_path is empty".to_string()));
        }
        if self.collections_root.as_os_str().is_empty() {
            return Err(MpoxError::Config("collections_root is empty".to_string()));
        }
        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level)
    }

    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            device: self.device,
            preprocess: PreprocessConfig {
                image_size: self.image_size,
            },
        }
    }

    pub fn filename_template(&self) -> FilenameTemplate {
        FilenameTemplate {
            prefix: self.filename_prefix.clone(),
            include_confidence: self.include_confidence_in_filename,
        }
    }

    pub fn collection_store(&self) -> CollectionStore {
        CollectionStore::new(&self.collections_root, self.filename_template())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/best_model.mpk"));
        assert_eq!(config.image_size, 224);
        assert_eq!(config.device, DevicePreference::Auto);
        assert!(config.include_confidence_in_filename);
        assert_eq!(config.log_level(), LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mpox.json");
        std::fs::write(&path, r#"{"device": "cpu", "filename_prefix": "mobile"}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.filename_template(), FilenameTemplate::mobile());
        assert_eq!(config.collections_root, PathBuf::from("collections"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mpox.json");
        let config = AppConfig {
            image_size: 128,
            include_confidence_in_filename: false,
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mpox.json");
        std::fs::write(&path, r#"{"image_size": 8}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(MpoxError::Config(_))));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(MpoxError::Config(_))));

        assert!(AppConfig::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_or_default_without_path() {
        assert_eq!(AppConfig::load_or_default(None).unwrap(), AppConfig::default());
    }
}
