//! Display Schema

use crate::features::{Feature, FEATURE_DIMENSION};
use data_validator::ValidationError;
use serde::{Deserialize, Serialize};

/// Display names for the nine features.
///
/// Only affects presentation; the canonical order of [`Feature::ALL`] is
/// never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    labels: Vec<String>,
    short_names: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            labels: Feature::ALL.iter().map(|f| f.label().to_string()).collect(),
            short_names: Feature::ALL.iter().map(|f| f.short_name().to_string()).collect(),
        }
    }
}

impl FeatureSchema {
    /// Schema with custom labels and short names.
    ///
    /// `None` keeps the defaults for that list.
    pub fn with_names(
        labels: Option<Vec<String>>,
        short_names: Option<Vec<String>>,
    ) -> Result<Self, ValidationError> {
        let mut schema = Self::default();
        if let Some(labels) = labels {
            check_len(labels.len())?;
            schema.labels = labels;
        }
        if let Some(short_names) = short_names {
            check_len(short_names.len())?;
            check_unique(&short_names)?;
            schema.short_names = short_names;
        }
        Ok(schema)
    }

    /// Label shown next to the input field
    pub fn label(&self, feature: Feature) -> &str {
        &self.labels[feature.index()]
    }

    /// Abbreviation shown on charts
    pub fn short_name(&self, feature: Feature) -> &str {
        &self.short_names[feature.index()]
    }

    /// Short names in canonical order
    pub fn short_names(&self) -> &[String] {
        &self.short_names
    }

    /// Labels in canonical order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

fn check_len(actual: usize) -> Result<(), ValidationError> {
    if actual != FEATURE_DIMENSION {
        return Err(ValidationError::WrongLength {
            expected: FEATURE_DIMENSION,
            actual,
        });
    }
    Ok(())
}

/// Short names key the per-feature contributions, so they must be distinct
fn check_unique(names: &[String]) -> Result<(), ValidationError> {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(ValidationError::DuplicateName(name.clone()));
        }
    }
    Ok(())
}
