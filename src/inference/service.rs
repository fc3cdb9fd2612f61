//! Inference service
//!
//! Owns the predictor for the lifetime of the process. The model is loaded
//! exactly once at start-up; if that fails the service stays up and answers
//! every request with [`MpoxError::ModelUnavailable`].

use std::path::Path;

use image::DynamicImage;
use serde::Serialize;
use tracing::{error, info};

use super::predictor::{ImageSource, PredictionResult, Predictor, PredictorConfig};
use crate::model::NetworkLoader;
use crate::utils::error::{MpoxError, Result};

/// Whether the service can classify
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceStatus {
    Ready,
    Unavailable { reason: String },
}

pub struct InferenceService {
    predictor: Predictor,
    status: ServiceStatus,
}

impl InferenceService {
    /// Build the predictor and attempt the one-time model load
    pub fn start(config: PredictorConfig, model_path: &Path) -> Self {
        let mut predictor = Predictor::new(config);
        let result = predictor.load_model(model_path);
        Self::from_load_result(predictor, result)
    }

    /// Same as [`InferenceService::start`] with a custom network loader
    pub fn start_with<L: NetworkLoader + ?Sized>(
        config: PredictorConfig,
        loader: &L,
        model_path: &Path,
    ) -> Self {
        let mut predictor = Predictor::new(config);
        let result = predictor.load_model_with(loader, model_path);
        Self::from_load_result(predictor, result)
    }

    /// Wrap a predictor built elsewhere
    pub fn with_predictor(predictor: Predictor) -> Self {
        let status = if predictor.is_loaded() {
            ServiceStatus::Ready
        } else {
            ServiceStatus::Unavailable {
                reason: MpoxError::ModelNotLoaded.to_string(),
            }
        };
        Self { predictor, status }
    }

    fn from_load_result(predictor: Predictor, result: Result<()>) -> Self {
        let status = match result {
            Ok(()) => {
                info!("Inference service ready on {}", predictor.device());
                ServiceStatus::Ready
            }
            Err(e) => {
                error!("Model failed to load, classification disabled: {}", e);
                ServiceStatus::Unavailable {
                    reason: e.to_string(),
                }
            }
        };
        Self { predictor, status }
    }

    pub fn status(&self) -> &ServiceStatus {
        &self.status
    }

    pub fn is_available(&self) -> bool {
        self.status == ServiceStatus::Ready
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Classify one image
    pub fn classify(&self, source: ImageSource) -> Result<PredictionResult> {
        self.ensure_available()?;
        self.predictor.predict(source)
    }

    /// Classify an already decoded image
    pub fn classify_image(&self, img: &DynamicImage) -> Result<PredictionResult> {
        self.ensure_available()?;
        self.predictor.predict_image(img)
    }

    fn ensure_available(&self) -> Result<()> {
        match &self.status {
            ServiceStatus::Ready => Ok(()),
            ServiceStatus::Unavailable { reason } => {
                Err(MpoxError::ModelUnavailable(reason.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DevicePreference;
    use crate::dataset::Label;
    use crate::inference::preprocess::PreprocessConfig;
    use crate::inference::test_support::{solid_image, FailingLoader, FixedLoader};

    fn config() -> PredictorConfig {
        PredictorConfig {
            device: DevicePreference::Cpu,
            preprocess: PreprocessConfig { image_size: 8 },
        }
    }

    #[test]
    fn test_saved_resnet_classifies_full_size_image() {
        use crate::model::ResNet18Config;
        use burn::module::Module;
        use burn::record::CompactRecorder;
        use burn_ndarray::{NdArray, NdArrayDevice};
        use image::{DynamicImage, Rgba, RgbaImage};

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("best_model.mpk");
        ResNet18Config::new()
            .init::<NdArray<f32>>(&NdArrayDevice::Cpu)
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();

        let service = InferenceService::start(
            PredictorConfig {
                device: DevicePreference::Cpu,
                preprocess: PreprocessConfig::default(),
            },
            &path,
        );
        assert_eq!(service.status(), &ServiceStatus::Ready);

        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(224, 224, Rgba([180, 90, 70, 128])));
        let first = service.classify_image(&img).unwrap();
        let second = service.classify_image(&img).unwrap();

        assert!(Label::ALL.contains(&first.predicted_class));
        let sum: f32 = first.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(first.confidence, first.probability(first.predicted_class));
        assert_eq!(first.probabilities, second.probabilities);
    }

    #[test]
    fn test_missing_model_leaves_service_unavailable() {
        let service = InferenceService::start(config(), Path::new("/nonexistent/best_model.mpk"));
        assert!(!service.is_available());

        match service.status() {
            ServiceStatus::Unavailable { reason } => assert!(reason.contains("best_model")),
            ServiceStatus::Ready => panic!("service should be unavailable"),
        }

        assert!(matches!(
            service.classify(ImageSource::Bitmap(solid_image(4, 4))),
            Err(MpoxError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_failing_loader_is_not_retried() {
        let service = InferenceService::start_with(config(), &FailingLoader, Path::new("m.mpk"));
        assert!(!service.is_available());
        assert!(service.classify_image(&solid_image(4, 4)).is_err());
        assert!(service.classify_image(&solid_image(4, 4)).is_err());
    }

    #[test]
    fn test_ready_service_classifies() {
        let loader = FixedLoader(vec![0.2, 1.5]);
        let service = InferenceService::start_with(config(), &loader, Path::new("m.mpk"));
        assert!(service.is_available());

        let result = service
            .classify(ImageSource::Bitmap(solid_image(10, 10)))
            .unwrap();
        assert_eq!(result.predicted_class, Label::Others);
    }

    #[test]
    fn test_adapter_errors_pass_through() {
        let service = InferenceService::start_with(config(), &FixedLoader(vec![0.0, 0.0]), Path::new("m"));
        assert!(matches!(
            service.classify(ImageSource::Bytes(vec![1, 2, 3])),
            Err(MpoxError::InvalidImage(_))
        ));

        let service = InferenceService::start_with(config(), &FixedLoader(vec![f32::NAN, 0.0]), Path::new("m"));
        assert!(matches!(
            service.classify_image(&solid_image(4, 4)),
            Err(MpoxError::Inference(_))
        ));
    }

    #[test]
    fn test_with_predictor_without_model() {
        let service = InferenceService::with_predictor(Predictor::new(config()));
        assert!(!service.is_available());
    }
}
