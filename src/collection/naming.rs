//! Collection file naming
//!
//! `{prefix_}{label stem}_{YYYYMMDD_HHMMSS}[_conf{ddd}].jpg`

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataset::Label;

/// Timestamp layout used in file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix used by the mobile front end
pub const MOBILE_PREFIX: &str = "mobile";

/// How saved images are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenameTemplate {
    /// Optional leading tag, joined with an underscore
    pub prefix: Option<String>,
    /// Append the prediction confidence
    pub include_confidence: bool,
}

impl Default for FilenameTemplate {
    fn default() -> Self {
        Self {
            prefix: None,
            include_confidence: true,
        }
    }
}

impl FilenameTemplate {
    pub fn mobile() -> Self {
        Self {
            prefix: Some(MOBILE_PREFIX.to_string()),
            include_confidence: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_confidence(mut self, include: bool) -> Self {
        self.include_confidence = include;
        self
    }

    /// Render the file name for one saved image
    pub fn render(&self, label: Label, confidence: f32, timestamp: NaiveDateTime) -> String {
        let mut name = String::new();

        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            name.push_str(prefix);
            name.push('_');
        }

        name.push_str(&label.file_stem());
        name.push('_');
        name.push_str(&timestamp.format(TIMESTAMP_FORMAT).to_string());

        if self.include_confidence {
            name.push_str("_conf");
            name.push_str(&confidence_digits(confidence));
        }

        name.push_str(".jpg");
        name
    }
}

/// Confidence with three decimals and the decimal point removed
/// (`0.934` becomes `"0934"`)
pub fn confidence_digits(confidence: f32) -> String {
    format!("{:.3}", confidence).replace('.', "")
}
