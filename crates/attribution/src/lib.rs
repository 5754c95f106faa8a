//! Feature Attribution
//!
//! Decomposes a tree ensemble prediction into a baseline expectation plus one
//! signed contribution per feature (Shapley values).
//!
//! Every method implements [`Attributor`]; [`AttributionChain`] runs a primary
//! method and falls back to a secondary one, tagging the result accordingly.

mod breakdown;
mod chain;
mod path;
mod tree_shap;

pub use breakdown::{AttributionBreakdown, AttributionMethod, Contribution, LOCAL_ACCURACY_TOLERANCE};
pub use chain::AttributionChain;
pub use tree_shap::TreeShap;

use thiserror::Error;

/// Errors during attribution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    #[error("Missing node statistics: {0}")]
    MissingNodeStats(String),
    #[error("Tree {tree} node {node} has unusable cover {cover}")]
    InvalidCover { tree: usize, node: usize, cover: f64 },
    #[error("{n_features} features exceed the enumeration limit of {max}")]
    TooManyFeatures { n_features: usize, max: usize },
    #[error("Expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Local accuracy violated: baseline + contributions = {reconstructed}, prediction = {prediction}")]
    LocalAccuracy { reconstructed: f64, prediction: f64 },
    #[error("Explanation unavailable: primary method failed ({primary}); fallback failed ({fallback})")]
    Unavailable { primary: String, fallback: String },
}

/// One way of computing per-feature attributions for a fixed model.
///
/// Implementations hold read-only model state and must be safe to share
/// between threads.
pub trait Attributor: Send + Sync {
    /// Which method this is
    fn method(&self) -> AttributionMethod;

    /// Expected model output the contributions are relative to
    fn baseline(&self) -> f64;

    /// Contribution of each feature, in input order
    fn attribute(&self, features: &[f64]) -> Result<Vec<f64>, ExplainError>;
}
