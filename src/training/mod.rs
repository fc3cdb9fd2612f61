//! Training module
//!
//! Supervised fine-tuning of ResNet-18 on an image folder: seeded
//! train/validation split, Adam with cross-entropy, early stopping on
//! validation loss and checkpointing of the best model.

pub mod config;
pub mod supervised;

pub use config::{TrainingConfig, TrainingOverrides};
pub use supervised::{
    evaluate, evaluate_accuracy, run_training, EarlyStopping, EvalMetrics, TrainingSummary,
    BEST_MODEL_NAME,
};

/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 100;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Default learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 1e-4;

/// Default early-stopping patience in epochs
pub const DEFAULT_PATIENCE: usize = 25;
