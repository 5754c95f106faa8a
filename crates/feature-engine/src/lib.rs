//! Feature Engine
//!
//! The nine biomechanical measurements fed to the ACL stress model, in the
//! order the model was fitted with, plus display metadata for presenters.

mod features;
mod schema;

pub use features::{Feature, FeatureVector, FEATURE_DIMENSION};
pub use schema::FeatureSchema;
