//! Error Handling Module
//!
//! Defines the error type shared by the model adapter, the inference service,
//! the collection store and the feedback workflow.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for monkeypox screening operations
#[derive(Error, Debug)]
pub enum MpoxError {
    /// Weight file missing, corrupt or incompatible with the architecture
    #[error("Failed to load model from '{path}': {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// `predict` was called before a model was loaded
    #[error("Model not loaded. Call load_model() first")]
    ModelNotLoaded,

    /// The service refused the request because its model failed to load
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Input is neither a decodable bitmap nor a readable image path
    #[error("Invalid image input: {0}")]
    InvalidImage(String),

    /// Unexpected failure during the forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// Persisting a collection entry failed
    #[error("Failed to save image to '{path}': {reason}")]
    Save { path: PathBuf, reason: String },

    /// Collection directories could not be read
    #[error("Collection stats unavailable: {0}")]
    StatsUnavailable(String),

    /// Label name outside the fixed two-class set
    #[error("Unknown label '{0}', expected \"Monkey Pox\" or \"Others\"")]
    UnknownLabel(String),

    /// Workflow action not allowed in the current session state
    #[error("Invalid workflow transition: {0}")]
    InvalidTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<image::ImageError> for MpoxError {
    fn from(err: image::ImageError) -> Self {
        MpoxError::InvalidImage(err.to_string())
    }
}

impl From<serde_json::Error> for MpoxError {
    fn from(err: serde_json::Error) -> Self {
        MpoxError::Serialization(err.to_string())
    }
}

/// Convenience Result type for monkeypox screening operations
pub type Result<T> = std::result::Result<T, MpoxError>;
