//! Inference Engine Implementation

use crate::artifact::{load_model, LoadedModel, ModelInfo};
use crate::forest::Forest;
use crate::InferenceError;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Regression inference over a loaded tree ensemble.
///
/// An engine only exists once a model has been loaded; the model is shared
/// read-only, so one engine can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    forest: Arc<Forest>,
    info: ModelInfo,
}

impl InferenceEngine {
    /// Load the model artifact at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let LoadedModel { forest, info } = load_model(path)?;
        info!(
            "Model loaded: {} trees over {} features ({}, objective {})",
            info.n_trees, info.n_features, info.format, info.objective
        );
        Ok(Self {
            forest: Arc::new(forest),
            info,
        })
    }

    /// Wrap an already loaded model
    pub fn new(model: LoadedModel) -> Self {
        Self {
            forest: Arc::new(model.forest),
            info: model.info,
        }
    }

    /// Run inference on one feature vector
    pub fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
        let start = std::time::Instant::now();

        if features.len() != self.forest.n_features() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.forest.n_features().to_string(),
                actual: features.len().to_string(),
            });
        }

        let output = self.forest.predict(features);
        debug!("Inference completed in {}us", start.elapsed().as_micros());
        Ok(output)
    }

    /// Shared handle to the model
    pub fn forest(&self) -> &Arc<Forest> {
        &self.forest
    }

    /// Model metadata
    pub fn info(&self) -> &ModelInfo {
        &self.info
    }
}
