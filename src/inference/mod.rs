//! Inference module for model prediction
//!
//! This module provides:
//! - Preprocessing shared with the training pipeline
//! - The model adapter (`Predictor`) and its `PredictionResult`
//! - The long-lived inference service with explicit availability

pub mod predictor;
pub mod preprocess;
pub mod service;

// Re-export main types for convenience
pub use predictor::{ImageSource, PredictionResult, Predictor, PredictorConfig};
pub use preprocess::{flatten_to_rgb, preprocess, ImageTensor, PreprocessConfig};
pub use service::{InferenceService, ServiceStatus};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use image::{DynamicImage, Rgb, RgbImage};

    use super::ImageTensor;
    use crate::model::{Logits, Network, NetworkLoader};
    use crate::utils::error::{MpoxError, Result};

    /// Network returning the same logits for every input
    pub struct FixedNetwork {
        logits: Vec<f32>,
        seen: Arc<Mutex<Vec<[usize; 4]>>>,
    }

    impl FixedNetwork {
        pub fn new(logits: Vec<f32>) -> Self {
            Self {
                logits,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Shapes of every input seen so far
        pub fn seen_shapes(&self) -> Arc<Mutex<Vec<[usize; 4]>>> {
            Arc::clone(&self.seen)
        }
    }

    impl Network for FixedNetwork {
        fn infer(&self, input: &ImageTensor) -> Result<Logits> {
            self.seen.lock().unwrap().push(input.shape);
            Ok(self.logits.clone())
        }
    }

    pub struct FixedLoader(pub Vec<f32>);

    impl NetworkLoader for FixedLoader {
        fn load_weights(&self, _path: &Path) -> Result<Box<dyn Network>> {
            Ok(Box::new(FixedNetwork::new(self.0.clone())))
        }
    }

    pub struct FailingLoader;

    impl NetworkLoader for FailingLoader {
        fn load_weights(&self, path: &Path) -> Result<Box<dyn Network>> {
            Err(MpoxError::ModelLoad {
                path: path.to_path_buf(),
                reason: "incompatible record".to_string(),
            })
        }
    }

    pub fn solid_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([180, 90, 60])))
    }
}
