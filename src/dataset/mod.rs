//! Dataset module: the fixed label set and training-data handling
//!
//! This module provides:
//! - The two-class label set shared by inference, collection and training
//! - Loading an image-folder dataset (`<root>/<class name>/*.jpg`)
//! - Burn `Dataset`/`Batcher` integration for the training loop
//! - Seeded train/validation splitting

pub mod burn_dataset;
pub mod loader;
pub mod split;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::MpoxError;

// Re-export main types for convenience
pub use burn_dataset::{LesionBatch, LesionBatcher, LesionBurnDataset, LesionItem};
pub use loader::{DatasetStats, ImageFolder, ImageSample};
pub use split::split_train_val;

/// Number of classes the classifier distinguishes
pub const NUM_CLASSES: usize = 2;

/// Class names in class-index order. Matches the sorted directory order
/// of the training image folder.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = ["Monkey Pox", "Others"];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

/// One of the two fixed classification labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Monkey Pox")]
    MonkeyPox,
    #[serde(rename = "Others")]
    Others,
}

impl Label {
    /// All labels in class-index order
    pub const ALL: [Label; NUM_CLASSES] = [Label::MonkeyPox, Label::Others];

    /// Class index used by the network output
    pub fn index(self) -> usize {
        match self {
            Label::MonkeyPox => 0,
            Label::Others => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Label> {
        Label::ALL.get(index).copied()
    }

    /// Display name, also used verbatim as the collection directory name
    pub fn name(self) -> &'static str {
        CLASS_NAMES[self.index()]
    }

    /// Name with spaces replaced by underscores, used in file names
    pub fn file_stem(self) -> String {
        self.name().replace(' ', "_")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Label {
    type Err = MpoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "monkeypox" | "mpox" => Ok(Label::MonkeyPox),
            "others" | "other" => Ok(Label::Others),
            _ => Err(MpoxError::UnknownLabel(s.to_string())),
        }
    }
}
