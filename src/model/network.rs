//! Network capability and the Burn-backed implementation
//!
//! The predictor only sees [`Network`] and [`NetworkLoader`], so any
//! classifier producing two logits can be plugged in.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn_ndarray::{NdArray, NdArrayDevice};
use tracing::info;

use super::resnet::{ResNet18, ResNet18Config};
use crate::backend::ComputeDevice;
use crate::inference::preprocess::ImageTensor;
use crate::utils::error::{MpoxError, Result};

/// Raw network outputs, one value per class
pub type Logits = Vec<f32>;

/// A loaded classifier able to run a forward pass
pub trait Network: Send {
    /// Run one forward pass on a single preprocessed image
    fn infer(&self, input: &ImageTensor) -> Result<Logits>;
}

/// Builds a [`Network`] from a weight file
pub trait NetworkLoader {
    fn load_weights(&self, path: &Path) -> Result<Box<dyn Network>>;
}

/// ResNet-18 running on a Burn backend
pub struct BurnNetwork<B: Backend> {
    model: ResNet18<B>,
    device: B::Device,
}

impl<B: Backend> BurnNetwork<B> {
    pub fn new(model: ResNet18<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Load a `CompactRecorder` record into a fresh ResNet-18
    pub fn load(path: &Path, num_classes: usize, device: B::Device) -> Result<Self> {
        let model = load_resnet18::<B>(path, num_classes, &device)?;
        Ok(Self { model, device })
    }
}

/// Fresh ResNet-18 with the weights stored at `path`
///
/// A missing file or a record that does not match the architecture is a
/// `ModelLoad` error naming `path`.
pub fn load_resnet18<B: Backend>(
    path: &Path,
    num_classes: usize,
    device: &B::Device,
) -> Result<ResNet18<B>> {
    let record_path = record_path(path);
    if !record_path.is_file() {
        return Err(MpoxError::ModelLoad {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    ResNet18Config::new()
        .with_num_classes(num_classes)
        .init::<B>(device)
        .load_file(record_path, &CompactRecorder::new(), device)
        .map_err(|e| MpoxError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

impl<B: Backend> Network for BurnNetwork<B> {
    fn infer(&self, input: &ImageTensor) -> Result<Logits> {
        let tensor = Tensor::<B, 4>::from_floats(
            TensorData::new(input.data.clone(), input.shape),
            &self.device,
        );

        let output = self.model.forward(tensor);
        output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| MpoxError::Inference(format!("{:?}", e)))
    }
}

/// Loads ResNet-18 weights onto the negotiated compute device
#[derive(Debug, Clone, Copy)]
pub struct ResNetLoader {
    pub device: ComputeDevice,
    pub num_classes: usize,
}

impl ResNetLoader {
    pub fn new(device: ComputeDevice) -> Self {
        Self {
            device,
            num_classes: crate::NUM_CLASSES,
        }
    }
}

impl NetworkLoader for ResNetLoader {
    fn load_weights(&self, path: &Path) -> Result<Box<dyn Network>> {
        info!(
            "Loading ResNet-18 weights from {:?} on {}",
            path,
            self.device.backend_name()
        );

        match self.device {
            #[cfg(all(feature = "wgpu", target_os = "macos"))]
            ComputeDevice::Metal => Ok(Box::new(BurnNetwork::<burn_wgpu::Wgpu>::load(
                path,
                self.num_classes,
                burn_wgpu::WgpuDevice::DefaultDevice,
            )?)),
            #[cfg(feature = "cuda")]
            ComputeDevice::Cuda => Ok(Box::new(BurnNetwork::<burn_cuda::Cuda>::load(
                path,
                self.num_classes,
                burn_cuda::CudaDevice::default(),
            )?)),
            _ => Ok(Box::new(BurnNetwork::<NdArray<f32>>::load(
                path,
                self.num_classes,
                NdArrayDevice::Cpu,
            )?)),
        }
    }
}

/// Burn's file recorders always use their own extension
fn record_path(path: &Path) -> PathBuf {
    path.with_extension("mpk")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::preprocess::{preprocess, PreprocessConfig};
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_missing_weights_name_the_path() {
        let loader = ResNetLoader::new(ComputeDevice::Cpu);
        let err = match loader.load_weights(Path::new("/nonexistent/best_model.mpk")) {
            Err(e) => e,
            Ok(_) => panic!("loading a missing file must fail"),
        };

        match err {
            MpoxError::ModelLoad { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/best_model.mpk"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_weights_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mpk");
        std::fs::write(&path, b"not a record").unwrap();

        let result = ResNetLoader::new(ComputeDevice::Cpu).load_weights(&path);
        assert!(matches!(result, Err(MpoxError::ModelLoad { .. })));
    }

    #[test]
    fn test_saved_model_reloads_and_infers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("best_model.mpk");
        let device = NdArrayDevice::Cpu;

        ResNet18Config::new()
            .init::<TestBackend>(&device)
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();

        let network = ResNetLoader::new(ComputeDevice::Cpu)
            .load_weights(&path)
            .unwrap();

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 40, Rgb([200, 120, 90])));
        let input = preprocess(&img, &PreprocessConfig { image_size: 32 });

        let logits = network.infer(&input).unwrap();
        assert_eq!(logits.len(), 2);
        assert!(logits.iter().all(|v| v.is_finite()));

        // Inference-only backend: repeated passes are identical
        assert_eq!(network.infer(&input).unwrap(), logits);
    }
}
