//! Burn Dataset Integration for lesion images
//!
//! Implements Burn's `Dataset` trait and `Batcher` so the training loop can
//! iterate over an image folder. Items go through the same preprocessing as
//! inference (alpha flattened onto white, exact bilinear resize, [0, 1] CHW).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::ImageReader;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{info, warn};

use super::loader::ImageSample;
use crate::inference::preprocess::{preprocess, PreprocessConfig};
use crate::utils::error::Result;

/// A single lesion image ready for Burn
#[derive(Clone, Debug)]
pub struct LesionItem {
    /// Image data as flattened CHW float array [3 * H * W]
    pub image: Vec<f32>,
    /// Class index (0 = Monkey Pox, 1 = Others)
    pub label: usize,
    /// Image path (for logging)
    pub path: String,
}

impl LesionItem {
    /// Load and preprocess an image from disk
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let tensor = preprocess(&img, &PreprocessConfig { image_size });

        Ok(Self {
            image: tensor.data,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// Lesion dataset implementing Burn's Dataset trait
///
/// Loads images lazily unless built with [`LesionBurnDataset::new_cached`].
#[derive(Debug, Clone)]
pub struct LesionBurnDataset {
    samples: Vec<(PathBuf, usize)>,
    image_size: usize,
    cached_items: Option<Vec<LesionItem>>,
}

impl LesionBurnDataset {
    pub fn new(samples: &[ImageSample], image_size: usize) -> Self {
        Self {
            samples: samples
                .iter()
                .map(|s| (s.path.clone(), s.label.index()))
                .collect(),
            image_size,
            cached_items: None,
        }
    }

    /// Load every image into memory up front, in parallel.
    ///
    /// Images that fail to decode are skipped with a warning.
    pub fn new_cached(samples: &[ImageSample], image_size: usize) -> Result<Self> {
        let total = samples.len();
        info!("Pre-loading {} images into memory", total);

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let loaded = AtomicUsize::new(0);
        let cached_items: Vec<LesionItem> = samples
            .par_iter()
            .filter_map(|s| {
                let result = match LesionItem::from_path(&s.path, s.label.index(), image_size) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!("Skipping {:?}: {}", s.path, e);
                        None
                    }
                };
                let count = loaded.fetch_add(1, Ordering::Relaxed);
                if count % 50 == 0 {
                    pb.set_position(count as u64);
                }
                result
            })
            .collect();

        pb.finish_and_clear();
        info!("Loaded {}/{} images", cached_items.len(), total);

        let loaded_samples = cached_items
            .iter()
            .map(|item| (PathBuf::from(&item.path), item.label))
            .collect();

        Ok(Self {
            samples: loaded_samples,
            image_size,
            cached_items: Some(cached_items),
        })
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Samples per class index
    pub fn class_distribution(&self) -> [usize; super::NUM_CLASSES] {
        let mut counts = [0usize; super::NUM_CLASSES];
        for (_, label) in &self.samples {
            if let Some(c) = counts.get_mut(*label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<LesionItem> for LesionBurnDataset {
    fn get(&self, index: usize) -> Option<LesionItem> {
        if let Some(ref cached) = self.cached_items {
            return cached.get(index).cloned();
        }

        let (path, label) = self.samples.get(index)?;
        match LesionItem::from_path(path, *label, self.image_size) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Failed to load {:?}: {}", path, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of lesion images
#[derive(Clone, Debug)]
pub struct LesionBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Class indices with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher stacking preprocessed items into tensors
#[derive(Clone, Debug)]
pub struct LesionBatcher {
    image_size: usize,
}

impl LesionBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, LesionItem, LesionBatch<B>> for LesionBatcher {
    fn batch(&self, items: Vec<LesionItem>, device: &B::Device) -> LesionBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        LesionBatch { images, targets }
    }
}
