//! Training hyperparameters

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_PATIENCE};
use crate::utils::error::{MpoxError, Result};

/// Configuration for a supervised training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Image folder split into train/validation (`<dir>/<class>/*.jpg`)
    pub data_dir: PathBuf,

    /// Optional held-out image folder evaluated once with the best model
    pub test_dir: Option<PathBuf>,

    /// Where `best_model.mpk` and the config copy are written
    pub output_dir: PathBuf,

    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,

    /// Epochs without validation-loss improvement before stopping
    pub patience: usize,

    /// Share of `data_dir` used for training, the rest validates
    pub train_fraction: f64,

    pub image_size: usize,
    pub seed: u64,

    /// Record to start from instead of random weights, e.g. the deployed
    /// `best_model.mpk` when retraining on collected images
    pub pretrained_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/train"),
            test_dir: None,
            output_dir: PathBuf::from("models"),
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
            patience: DEFAULT_PATIENCE,
            train_fraction: 0.8,
            image_size: crate::IMAGE_SIZE,
            seed: 42,
            pretrained_path: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(MpoxError::Config("epochs must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(MpoxError::Config("batch_size must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MpoxError::Config("learning_rate must be positive".to_string()));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(MpoxError::Config(
                "train_fraction must be strictly between 0 and 1".to_string(),
            ));
        }
        if self.image_size < 32 {
            return Err(MpoxError::Config("image_size must be at least 32".to_string()));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MpoxError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MpoxError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Replace every field the overrides set
    pub fn with_overrides(mut self, overrides: TrainingOverrides) -> Self {
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir = data_dir;
        }
        if overrides.test_dir.is_some() {
            self.test_dir = overrides.test_dir;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(epochs) = overrides.epochs {
            self.epochs = epochs;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(learning_rate) = overrides.learning_rate {
            self.learning_rate = learning_rate;
        }
        if let Some(patience) = overrides.patience {
            self.patience = patience;
        }
        if let Some(image_size) = overrides.image_size {
            self.image_size = image_size;
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        if overrides.pretrained_path.is_some() {
            self.pretrained_path = overrides.pretrained_path;
        }
        self
    }
}

/// Command-line values layered over a file or the defaults
#[derive(Debug, Clone, Default)]
pub struct TrainingOverrides {
    pub data_dir: Option<PathBuf>,
    pub test_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub patience: Option<usize>,
    pub image_size: Option<usize>,
    pub seed: Option<u64>,
    pub pretrained_path: Option<PathBuf>,
}
