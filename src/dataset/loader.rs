//! Image-folder dataset loader
//!
//! Loads a labeled dataset laid out as one sub-directory per class,
//! the same layout the collection store writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::Label;
use crate::utils::error::{MpoxError, Result};

/// File extensions accepted as training images
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Whether a path has one of the recognized image extensions (case-insensitive)
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// A single image sample with its label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label
    pub label: Label,
}

/// Labeled image-folder dataset
#[derive(Debug)]
pub struct ImageFolder {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples, grouped by class then sorted by path
    pub samples: Vec<ImageSample>,
}

impl ImageFolder {
    /// Load a dataset from a directory
    ///
    /// The directory should be structured as:
    /// ```text
    /// root_dir/
    /// ├── Monkey Pox/
    /// │   ├── image1.jpg
    /// │   └── image2.jpg
    /// └── Others/
    ///     └── ...
    /// ```
    /// Every class directory must name one of the two labels.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading image folder from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(MpoxError::Dataset(format!(
                "dataset directory does not exist: {}",
                root_dir.display()
            )));
        }

        let mut class_dirs: Vec<(String, Label)> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let label = name.parse::<Label>().map_err(|_| {
                MpoxError::Dataset(format!("unexpected class directory '{}'", name))
            })?;
            class_dirs.push((name, label));
        }
        class_dirs.sort();

        let mut samples = Vec::new();
        for (dir_name, label) in &class_dirs {
            let class_dir = root_dir.join(dir_name);
            let mut paths: Vec<PathBuf> = WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path().to_path_buf())
                .filter(|p| is_image_file(p))
                .collect();
            paths.sort();

            debug!("Class '{}': {} images", dir_name, paths.len());
            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label: *label,
            }));
        }

        info!(
            "Loaded {} samples from {} classes",
            samples.len(),
            class_dirs.len()
        );

        Ok(Self { root_dir, samples })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts: BTreeMap<Label, usize> =
            Label::ALL.iter().map(|&l| (l, 0)).collect();
        for sample in &self.samples {
            *class_counts.entry(sample.label).or_insert(0) += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            class_counts,
        }
    }
}

/// Statistics about a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub class_counts: BTreeMap<Label, usize>,
}

impl std::fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset Statistics:")?;
        writeln!(f, "  Total samples: {}", self.total_samples)?;
        for (label, count) in &self.class_counts {
            writeln!(f, "  {:12} {:6}", label.name(), count)?;
        }
        Ok(())
    }
}
