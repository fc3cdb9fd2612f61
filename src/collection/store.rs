//! Labelled image collection on disk
//!
//! Layout: `<root>/<label display name>/<file name>.jpg`, the same layout the
//! training image folder reads.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info};

use super::naming::FilenameTemplate;
use crate::dataset::loader::is_image_file;
use crate::dataset::Label;
use crate::inference::preprocess::flatten_to_rgb;
use crate::utils::error::{MpoxError, Result};
use crate::JPEG_QUALITY;

/// Per-label image counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub counts: BTreeMap<Label, usize>,
}

impl CollectionStats {
    pub fn count(&self, label: Label) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for CollectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in Label::ALL {
            writeln!(f, "{}: {} images", label, self.count(label))?;
        }
        write!(f, "Total: {} images", self.total())
    }
}

/// Writes confirmed images into per-label directories
#[derive(Debug, Clone)]
pub struct CollectionStore {
    root: PathBuf,
    template: FilenameTemplate,
}

impl CollectionStore {
    pub fn new(root: impl Into<PathBuf>, template: FilenameTemplate) -> Self {
        Self {
            root: root.into(),
            template,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template(&self) -> &FilenameTemplate {
        &self.template
    }

    /// Directory holding images of `label`
    pub fn label_dir(&self, label: Label) -> PathBuf {
        self.root.join(label.name())
    }

    /// Save an image stamped with the local time
    pub fn save(&self, image: &DynamicImage, label: Label, confidence: f32) -> Result<PathBuf> {
        self.save_at(image, label, confidence, Local::now().naive_local())
    }

    /// Save an image as JPEG under its label directory.
    ///
    /// An existing file with the same name is overwritten.
    pub fn save_at(
        &self,
        image: &DynamicImage,
        label: Label,
        confidence: f32,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf> {
        let dir = self.label_dir(label);
        let path = dir.join(self.template.render(label, confidence, timestamp));

        let save_err = |reason: String| MpoxError::Save {
            path: path.clone(),
            reason,
        };

        fs::create_dir_all(&dir).map_err(|e| save_err(e.to_string()))?;

        let rgb = flatten_to_rgb(image);
        write_or_remove(&path, |writer| {
            JpegEncoder::new_with_quality(writer, JPEG_QUALITY)
                .encode_image(&rgb)
                .map_err(|e| e.to_string())
        })
        .map_err(save_err)?;

        info!("Saved {} image to {:?}", label, path);
        Ok(path)
    }

    /// Number of image files saved under `label`
    pub fn count(&self, label: Label) -> Result<usize> {
        Ok(self.entries(label)?.len())
    }

    /// Counts for both labels
    pub fn stats(&self) -> Result<CollectionStats> {
        let mut counts = BTreeMap::new();
        for label in Label::ALL {
            counts.insert(label, self.count(label)?);
        }
        debug!("Collection stats: {:?}", counts);
        Ok(CollectionStats { counts })
    }

    /// Saved image files for `label`, sorted by name
    pub fn entries(&self, label: Label) -> Result<Vec<PathBuf>> {
        let dir = self.label_dir(label);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let unavailable =
            |e: std::io::Error| MpoxError::StatsUnavailable(format!("{}: {}", dir.display(), e));

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let path = entry.path();
            if entry.file_type().map_err(unavailable)?.is_file() && is_image_file(&path) {
                entries.push(path);
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// Create `path` and fill it with `write`. A partially written file is
/// removed so it never shows up as a collection entry.
fn write_or_remove<F>(path: &Path, write: F) -> std::result::Result<(), String>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), String>,
{
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);

    let result = write(&mut writer).and_then(|_| writer.flush().map_err(|e| e.to_string()));
    if result.is_err() {
        drop(writer);
        if let Err(e) = fs::remove_file(path) {
            debug!("Could not remove partial file {:?}: {}", path, e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([200, 40, 40, 128])))
    }

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 0, second)
            .unwrap()
    }

    #[test]
    fn test_label_dir_keeps_spaces() {
        let store = CollectionStore::new("/data/collections", FilenameTemplate::default());
        assert_eq!(
            store.label_dir(Label::MonkeyPox),
            PathBuf::from("/data/collections/Monkey Pox")
        );
    }

    #[test]
    fn test_save_then_count() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());

        assert_eq!(store.count(Label::MonkeyPox).unwrap(), 0);

        let path = store.save_at(&image(), Label::MonkeyPox, 0.934, at(1)).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("Monkey Pox")
                .join("Monkey_Pox_20240701_090001_conf0934.jpg")
        );
        assert!(path.is_file());

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        assert!(!decoded.color().has_alpha());

        assert_eq!(store.count(Label::MonkeyPox).unwrap(), 1);
        assert_eq!(store.count(Label::Others).unwrap(), 0);
    }

    #[test]
    fn test_same_second_without_confidence_overwrites() {
        let dir = TempDir::new().unwrap();
        let store =
            CollectionStore::new(dir.path(), FilenameTemplate::default().with_confidence(false));

        let first = store.save_at(&image(), Label::Others, 0.7, at(5)).unwrap();
        let second = store.save_at(&image(), Label::Others, 0.9, at(5)).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count(Label::Others).unwrap(), 1);
    }

    #[test]
    fn test_count_ignores_non_images() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        let others = store.label_dir(Label::Others);
        fs::create_dir_all(others.join("nested")).unwrap();
        fs::write(others.join("a.JPG"), b"x").unwrap();
        fs::write(others.join("b.webp"), b"x").unwrap();
        fs::write(others.join("c.png"), b"x").unwrap();
        fs::write(others.join("notes.txt"), b"x").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.count(Label::Others), 3);
        assert_eq!(stats.count(Label::MonkeyPox), 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_entries_sorted() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        store.save_at(&image(), Label::MonkeyPox, 0.8, at(9)).unwrap();
        store.save_at(&image(), Label::MonkeyPox, 0.8, at(3)).unwrap();

        let entries = store.entries(Label::MonkeyPox).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0] < entries[1]);
    }

    #[test]
    fn test_save_failure_names_target() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("root");
        fs::write(&blocker, b"a file, not a directory").unwrap();

        let store = CollectionStore::new(&blocker, FilenameTemplate::default());
        match store.save_at(&image(), Label::Others, 0.6, at(0)) {
            Err(MpoxError::Save { path, .. }) => assert!(path.starts_with(&blocker)),
            other => panic!("expected save error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        fs::create_dir_all(store.label_dir(Label::Others)).unwrap();
        let path = store.label_dir(Label::Others).join("Others_partial.jpg");

        let result = write_or_remove(&path, |writer| {
            writer.write_all(&[0xFF, 0xD8, 0xFF]).map_err(|e| e.to_string())?;
            Err("encoder failed".to_string())
        });

        assert_eq!(result, Err("encoder failed".to_string()));
        assert!(!path.exists());
        assert_eq!(store.count(Label::Others).unwrap(), 0);
    }

    #[test]
    fn test_stats_unreadable_directory() {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::new(dir.path(), FilenameTemplate::default());
        // A regular file where the label directory should be
        fs::write(store.label_dir(Label::Others), b"x").unwrap();

        assert!(matches!(store.stats(), Err(MpoxError::StatsUnavailable(_))));
    }

    #[test]
    fn test_stats_display() {
        let mut counts = BTreeMap::new();
        counts.insert(Label::MonkeyPox, 2);
        counts.insert(Label::Others, 1);
        let text = CollectionStats { counts }.to_string();
        assert!(text.contains("Monkey Pox: 2 images"));
        assert!(text.contains("Total: 3 images"));
    }
}
