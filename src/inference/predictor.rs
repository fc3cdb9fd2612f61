//! Inference Predictor Module
//!
//! Wraps a loaded [`Network`]: decodes the input, preprocesses it, runs one
//! forward pass and turns the two logits into a labelled probability
//! distribution.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::preprocess::{preprocess, PreprocessConfig};
use crate::backend::{ComputeDevice, DevicePreference};
use crate::dataset::{Label, NUM_CLASSES};
use crate::model::{Logits, Network, NetworkLoader, ResNetLoader};
use crate::utils::error::{MpoxError, Result};

/// An image handed to the predictor
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Already decoded image
    Bitmap(DynamicImage),
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image bytes, e.g. an upload
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Decode into a bitmap
    pub fn decode(self) -> Result<DynamicImage> {
        match self {
            ImageSource::Bitmap(img) => Ok(img),
            ImageSource::Path(path) => ImageReader::open(&path)
                .map_err(|e| {
                    MpoxError::InvalidImage(format!("cannot open {}: {}", path.display(), e))
                })?
                .with_guessed_format()
                .map_err(|e| MpoxError::InvalidImage(e.to_string()))?
                .decode()
                .map_err(|e| {
                    MpoxError::InvalidImage(format!("cannot decode {}: {}", path.display(), e))
                }),
            ImageSource::Bytes(bytes) => Ok(ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| MpoxError::InvalidImage(e.to_string()))?
                .decode()?),
        }
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(img: DynamicImage) -> Self {
        ImageSource::Bitmap(img)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Most probable label
    pub predicted_class: Label,

    /// Probability of the predicted label
    pub confidence: f32,

    /// Probability of every label, summing to one
    pub probabilities: BTreeMap<Label, f32>,

    /// Forward pass time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Build a result from raw logits.
    ///
    /// Softmax is computed with the maximum subtracted first. On an exact
    /// tie the label with the lowest class index wins.
    pub fn from_logits(logits: &[f32], inference_time: Duration) -> Result<Self> {
        if logits.len() != NUM_CLASSES {
            return Err(MpoxError::Inference(format!(
                "expected {} logits, got {}",
                NUM_CLASSES,
                logits.len()
            )));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(MpoxError::Inference(format!(
                "network produced non-finite logits: {:?}",
                logits
            )));
        }

        let max = logits.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64));
        let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        let probs: Vec<f32> = exps.iter().map(|&e| (e / sum) as f32).collect();

        let mut best = 0;
        for (i, &p) in probs.iter().enumerate().skip(1) {
            if p > probs[best] {
                best = i;
            }
        }

        let probabilities = Label::ALL
            .iter()
            .map(|&label| (label, probs[label.index()]))
            .collect();

        Ok(Self {
            predicted_class: Label::ALL[best],
            confidence: probs[best],
            probabilities,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Probability assigned to `label`
    pub fn probability(&self, label: Label) -> f32 {
        self.probabilities.get(&label).copied().unwrap_or(0.0)
    }

    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }

    /// Get the entropy of the prediction (measure of uncertainty)
    pub fn entropy(&self) -> f32 {
        self.probabilities
            .values()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum()
    }

    /// Get the margin between the two label probabilities
    pub fn margin(&self) -> f32 {
        let mut probs: Vec<f32> = self.probabilities.values().copied().collect();
        probs.sort_by(|a, b| b.total_cmp(a));
        match probs.as_slice() {
            [first, second, ..] => first - second,
            [only] => *only,
            [] => 0.0,
        }
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Prediction: {}\n", self.predicted_class));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence_percent()));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str("\nProbabilities:\n");
        for (label, prob) in &self.probabilities {
            output.push_str(&format!("  {:12} {:6.2}%\n", label.name(), prob * 100.0));
        }

        output
    }
}

/// Predictor construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictorConfig {
    pub device: DevicePreference,
    pub preprocess: PreprocessConfig,
}

/// Model adapter: owns at most one loaded network
pub struct Predictor {
    device: ComputeDevice,
    preprocess: PreprocessConfig,
    network: Option<Box<dyn Network>>,
}

impl Predictor {
    /// Create a predictor with no model, negotiating the compute device
    pub fn new(config: PredictorConfig) -> Self {
        let device = config.device.resolve();
        info!("Predictor using {}", device.backend_name());

        Self {
            device,
            preprocess: config.preprocess,
            network: None,
        }
    }

    /// Create a predictor around an already loaded network
    pub fn with_network(network: Box<dyn Network>, preprocess: PreprocessConfig) -> Self {
        Self {
            device: ComputeDevice::Cpu,
            preprocess,
            network: Some(network),
        }
    }

    /// Load ResNet-18 weights onto the negotiated device
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        let loader = ResNetLoader::new(self.device);
        self.load_model_with(&loader, path)
    }

    /// Load weights through any [`NetworkLoader`].
    ///
    /// On failure the predictor keeps whatever it had before.
    pub fn load_model_with<L: NetworkLoader + ?Sized>(
        &mut self,
        loader: &L,
        path: &Path,
    ) -> Result<()> {
        let network = loader.load_weights(path)?;
        self.network = Some(network);
        info!("Model loaded from {:?}", path);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.network.is_some()
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub fn image_size(&self) -> usize {
        self.preprocess.image_size
    }

    /// Classify an image from any source
    pub fn predict(&self, source: ImageSource) -> Result<PredictionResult> {
        let network = self.network.as_ref().ok_or(MpoxError::ModelNotLoaded)?;
        let img = source.decode()?;
        self.run(network.as_ref(), &img)
    }

    /// Classify an already decoded image
    pub fn predict_image(&self, img: &DynamicImage) -> Result<PredictionResult> {
        let network = self.network.as_ref().ok_or(MpoxError::ModelNotLoaded)?;
        self.run(network.as_ref(), img)
    }

    fn run(&self, network: &dyn Network, img: &DynamicImage) -> Result<PredictionResult> {
        let start = Instant::now();
        let input = preprocess(img, &self.preprocess);
        debug!("Preprocessed {}x{} image in {:?}", img.width(), img.height(), start.elapsed());

        let start = Instant::now();
        let logits: Logits = network.infer(&input)?;
        let elapsed = start.elapsed();
        debug!("Forward pass took {:?}: {:?}", elapsed, logits);

        PredictionResult::from_logits(&logits, elapsed)
    }
}
