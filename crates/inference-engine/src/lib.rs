//! Tree Ensemble Inference Engine
//!
//! Loads a pre-fitted additive tree ensemble regressor and evaluates it on
//! feature vectors.

mod artifact;
mod engine;
mod forest;
mod xgboost;

pub use artifact::{
    encode_snapshot, load_model, parse_model, LoadedModel, ModelFormat, ModelInfo, SNAPSHOT_MAGIC,
    SNAPSHOT_VERSION,
};
pub use engine::InferenceEngine;
pub use forest::{goes_left, Forest, Node, Tree};
pub use xgboost::XgbModel;

use thiserror::Error;

/// Errors during model loading and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Invalid model: {0}")]
    InvalidModel(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
}
