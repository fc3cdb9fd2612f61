//! Supervised Training Implementation
//!
//! A custom training loop on Burn's optimizer API: shuffle, batch, forward,
//! cross-entropy, backward, Adam step. After every epoch the model is scored
//! on the validation split and checkpointed when the validation loss improves.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{backend::AutodiffBackend, backend::Backend, ElementConversion, Int, Tensor},
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::TrainingConfig;
use crate::dataset::{
    split_train_val, ImageFolder, LesionBatch, LesionBatcher, LesionBurnDataset, NUM_CLASSES,
};
use crate::model::{load_resnet18, ResNet18, ResNet18Config};
use crate::utils::error::{MpoxError, Result};
use crate::utils::format_duration;

/// File stem of the best checkpoint inside the output directory
pub const BEST_MODEL_NAME: &str = "best_model";

/// Tracks validation loss and decides when to stop
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best_loss: f64,
    counter: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f64::INFINITY,
            counter: 0,
        }
    }

    /// Record one epoch's validation loss. Returns true on improvement.
    pub fn update(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.counter = 0;
            true
        } else {
            self.counter += 1;
            false
        }
    }

    pub fn should_stop(&self) -> bool {
        self.counter >= self.patience
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Epochs since the last improvement
    pub fn counter(&self) -> usize {
        self.counter
    }
}

/// Loss and accuracy on one dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalMetrics {
    /// Mean cross-entropy over batches
    pub loss: f64,
    /// Percentage of correct predictions
    pub accuracy: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub best_val_accuracy: f64,
    pub stopped_early: bool,
    pub test_accuracy: Option<f64>,
    pub model_path: PathBuf,
    pub duration_secs: f64,
}

/// Run supervised training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
pub fn run_training<B>(config: &TrainingConfig) -> Result<TrainingSummary>
where
    B: AutodiffBackend,
{
    config.validate()?;
    let started = Instant::now();
    let device = B::Device::default();
    info!("Training on device {:?}", device);

    std::fs::create_dir_all(&config.output_dir)?;
    config.save(&config.output_dir.join("training_config.json"))?;

    let folder = ImageFolder::new(&config.data_dir)?;
    info!("{}", folder.stats());
    if folder.is_empty() {
        return Err(MpoxError::Dataset(format!(
            "no images found in {}",
            config.data_dir.display()
        )));
    }

    let (train_samples, val_samples) =
        split_train_val(&folder.samples, config.train_fraction, config.seed);
    info!(
        "Train samples: {} | Val samples: {}",
        train_samples.len(),
        val_samples.len()
    );
    if train_samples.is_empty() || val_samples.is_empty() {
        return Err(MpoxError::Training(format!(
            "need at least one training and one validation image, got {} and {}",
            train_samples.len(),
            val_samples.len()
        )));
    }

    let train_dataset = LesionBurnDataset::new_cached(&train_samples, config.image_size)?;
    let val_dataset = LesionBurnDataset::new_cached(&val_samples, config.image_size)?;
    if train_dataset.len() == 0 || val_dataset.len() == 0 {
        return Err(MpoxError::Training(format!(
            "no decodable images left after loading: {} training, {} validation",
            train_dataset.len(),
            val_dataset.len()
        )));
    }
    let batcher = LesionBatcher::new(config.image_size);

    let mut model: ResNet18<B> = match &config.pretrained_path {
        Some(path) => {
            info!("Starting from pretrained weights {:?}", path);
            load_resnet18::<B>(path, NUM_CLASSES, &device)?
        }
        None => ResNet18Config::new()
            .with_num_classes(NUM_CLASSES)
            .init(&device),
    };
    let mut optimizer = AdamConfig::new().init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    let model_path = config.output_dir.join(BEST_MODEL_NAME);
    let recorder = CompactRecorder::new();
    let mut stopper = EarlyStopping::new(config.patience);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    let mut best_epoch = 0;
    let mut best_val_accuracy = 0.0;
    let mut epochs_run = 0;
    let mut stopped_early = false;

    for epoch in 1..=config.epochs {
        epochs_run = epoch;

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);
        let num_batches = indices.len().div_ceil(config.batch_size);

        let pb = ProgressBar::new(num_batches as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  Epoch {msg} [{bar:30.cyan/blue}] {pos}/{len} batches")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("{}/{}", epoch, config.epochs));

        let mut running_loss = 0.0f64;
        let mut batches_seen = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<_> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: LesionBatch<B> = batcher.batch(items, &device);
            let output = model.forward(batch.images);
            let loss = loss_fn.forward(output, batch.targets);

            let loss_value: f64 = loss.clone().into_scalar().elem();
            running_loss += loss_value;
            batches_seen += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let train_loss = running_loss / batches_seen.max(1) as f64;
        let val = evaluate(&model.valid(), &val_dataset, config.batch_size, &device);

        info!(
            "Epoch {}/{} | Train Loss: {:.4} | Val Loss: {:.4} | Val Accuracy: {:.2}%",
            epoch, config.epochs, train_loss, val.loss, val.accuracy
        );

        if stopper.update(val.loss) {
            model
                .clone()
                .save_file(model_path.clone(), &recorder)
                .map_err(|e| MpoxError::Training(format!("failed to save model: {:?}", e)))?;
            best_epoch = epoch;
            best_val_accuracy = val.accuracy;
            info!("New best model saved to {:?}", model_path.with_extension("mpk"));
        } else {
            warn!(
                "No improvement. Patience counter: {}/{}",
                stopper.counter(),
                config.patience
            );
            if stopper.should_stop() {
                info!("Early stopping triggered after epoch {}", epoch);
                stopped_early = true;
                break;
            }
        }
    }

    let test_accuracy = match &config.test_dir {
        Some(test_dir) => Some(test_best_model::<B::InnerBackend>(
            &model_path,
            test_dir,
            config,
            &device,
        )?),
        None => None,
    };

    let duration_secs = started.elapsed().as_secs_f64();
    info!("Training finished in {}", format_duration(duration_secs));

    Ok(TrainingSummary {
        epochs_run,
        best_epoch,
        best_val_loss: stopper.best_loss(),
        best_val_accuracy,
        stopped_early,
        test_accuracy,
        model_path: model_path.with_extension("mpk"),
        duration_secs,
    })
}

/// Reload the best checkpoint and score it on the test folder
fn test_best_model<B: Backend>(
    model_path: &Path,
    test_dir: &Path,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<f64> {
    let model = load_resnet18::<B>(model_path, NUM_CLASSES, device)?;

    let folder = ImageFolder::new(test_dir)?;
    let dataset = LesionBurnDataset::new_cached(&folder.samples, config.image_size)?;
    let accuracy = evaluate_accuracy(&model, &dataset, config.batch_size, device);
    info!("Test Accuracy: {:.2}%", accuracy);

    Ok(accuracy)
}

/// Mean loss and accuracy of `model` over `dataset`
pub fn evaluate<B: Backend>(
    model: &ResNet18<B>,
    dataset: &LesionBurnDataset,
    batch_size: usize,
    device: &B::Device,
) -> EvalMetrics {
    let batcher = LesionBatcher::new(dataset.image_size());
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let len = dataset.len();

    let mut loss_sum = 0.0f64;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut total = 0usize;

    for start in (0..len).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: LesionBatch<B> = batcher.batch(items, device);
        let n = batch.targets.dims()[0];
        let output = model.forward(batch.images);

        let loss: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss;
        batches += 1;

        let predictions: Tensor<B, 1, Int> = output.argmax(1).reshape([n]);
        let batch_correct: i64 = predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        total += n;
    }

    debug!("Evaluated {} samples in {} batches", total, batches);

    EvalMetrics {
        loss: if batches == 0 {
            f64::INFINITY
        } else {
            loss_sum / batches as f64
        },
        accuracy: if total == 0 {
            0.0
        } else {
            100.0 * correct as f64 / total as f64
        },
    }
}

/// Percentage of correctly classified samples
pub fn evaluate_accuracy<B: Backend>(
    model: &ResNet18<B>,
    dataset: &LesionBurnDataset,
    batch_size: usize,
    device: &B::Device,
) -> f64 {
    evaluate(model, dataset, batch_size, device).accuracy
}
