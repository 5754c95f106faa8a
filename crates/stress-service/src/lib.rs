//! ACL Stress Service
//!
//! Predicts ACL stress from nine biomechanical measurements and explains each
//! prediction as a baseline plus one contribution per measurement.
//!
//! A [`StressService`] only exists with a model loaded, and holds nothing but
//! read-only state, so one instance can serve any number of concurrent
//! callers.

mod config;
mod service;

pub use config::{ServiceConfig, DEFAULT_MODEL_PATH};
pub use service::{Assessment, Prediction, StressService};

pub use attribution::{AttributionBreakdown, AttributionMethod, Contribution};
pub use feature_engine::{Feature, FeatureSchema, FeatureVector, FEATURE_DIMENSION};
pub use inference_engine::{ModelFormat, ModelInfo};

use attribution::ExplainError;
use data_validator::ValidationError;
use inference_engine::InferenceError;
use thiserror::Error;

/// Errors reported by the service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// Feature vector is malformed; per request
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Model artifact is missing, corrupt or incompatible; fatal at startup
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Both attribution methods failed; per request
    #[error("Explanation unavailable: {0}")]
    ExplanationUnavailable(String),

    /// Configuration values are inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<InferenceError> for ServiceError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::ModelLoadError(msg) | InferenceError::InvalidModel(msg) => {
                ServiceError::ModelLoad(msg)
            }
            other => ServiceError::ModelLoad(other.to_string()),
        }
    }
}

impl From<ExplainError> for ServiceError {
    fn from(e: ExplainError) -> Self {
        ServiceError::ExplanationUnavailable(e.to_string())
    }
}
