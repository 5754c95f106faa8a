//! Feature Vector Validator

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Required number of values
    pub expected_len: usize,
    /// Accept NaN and infinities (the model routes them via default directions)
    pub allow_non_finite: bool,
}

impl ValidationConfig {
    /// Strict config for a vector of `expected_len` finite values
    pub fn strict(expected_len: usize) -> Self {
        Self {
            expected_len,
            allow_non_finite: false,
        }
    }
}

/// Validator for raw feature vectors
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Number of values this validator expects
    pub fn expected_len(&self) -> usize {
        self.config.expected_len
    }

    /// Validate the length of a vector
    pub fn validate_len(&self, actual: usize) -> Result<(), ValidationError> {
        if actual != self.config.expected_len {
            return Err(ValidationError::WrongLength {
                expected: self.config.expected_len,
                actual,
            });
        }
        Ok(())
    }

    /// Validate a single value
    pub fn validate_value(&self, field: &str, value: f64) -> Result<(), ValidationError> {
        if !self.config.allow_non_finite && !value.is_finite() {
            return Err(ValidationError::NonFinite {
                field: field.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Validate a whole vector.
    ///
    /// `names` labels the values in error messages; positions without a name
    /// are reported as `feature[i]`.
    pub fn validate(&self, values: &[f64], names: &[&str]) -> Result<(), ValidationError> {
        self.validate_len(values.len())?;

        for (i, &value) in values.iter().enumerate() {
            match names.get(i) {
                Some(name) => self.validate_value(name, value)?,
                None => self.validate_value(&format!("feature[{i}]"), value)?,
            }
        }

        debug!("Validated {} values", values.len());
        Ok(())
    }
}
