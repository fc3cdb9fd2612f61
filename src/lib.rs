//! # Monkeypox Lesion Screening
//!
//! A Rust library that classifies skin-lesion photos as "Monkey Pox" or
//! "Others" with a ResNet-18 built on the Burn framework, and collects
//! user-confirmed images into a labelled folder tree for retraining.
//!
//! ## Modules
//!
//! - `backend`: compute device negotiation (Metal, CUDA, CPU)
//! - `dataset`: the two-class label set, image-folder loading and batching
//! - `model`: ResNet-18 and the `Network` capability the predictor runs on
//! - `inference`: preprocessing, the predictor and the inference service
//! - `collection`: saving confirmed images and counting them per label
//! - `workflow`: the feedback session, page navigation and guidance text
//! - `training`: supervised training with early stopping
//! - `utils`: errors, logging and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mpox_screen::config::AppConfig;
//! use mpox_screen::inference::{ImageSource, InferenceService};
//! use mpox_screen::workflow::{Confirmation, FeedbackSession};
//!
//! let config = AppConfig::default();
//! let service = InferenceService::start(config.predictor_config(), &config.model_path);
//!
//! let mut session = FeedbackSession::new();
//! let prediction = session.submit(&service, ImageSource::Path("lesion.jpg".into()))?;
//! println!("{}", prediction.display());
//!
//! session.answer(Confirmation::Correct)?;
//! let outcome = session.save(&config.collection_store())?;
//! ```

pub mod backend;
pub mod collection;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;
pub mod workflow;

// Re-export commonly used items for convenience
pub use backend::{ComputeDevice, DevicePreference};
pub use collection::{CollectionStats, CollectionStore, FilenameTemplate};
pub use config::AppConfig;
pub use dataset::Label;
pub use inference::{ImageSource, InferenceService, PredictionResult, Predictor};
pub use model::{Network, NetworkLoader, ResNet18};
pub use training::TrainingConfig;
pub use utils::error::{MpoxError, Result};
pub use workflow::{Confirmation, FeedbackSession, NavAction, Page};

/// Number of output classes
pub const NUM_CLASSES: usize = dataset::NUM_CLASSES;

/// Default network input size
pub const IMAGE_SIZE: usize = 224;

/// JPEG quality for saved collection images
pub const JPEG_QUALITY: u8 = 95;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
