//! Validation Error Types

use thiserror::Error;

/// Errors during data validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Vector has the wrong number of elements
    #[error("expected {expected} feature values, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// Value is NaN or infinite
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: String, value: f64 },

    /// Field text is not a decimal number
    #[error("{field}: cannot parse {text:?} as a number")]
    InvalidFormat { field: String, text: String },

    /// Name used for more than one feature
    #[error("duplicate feature name {0:?}")]
    DuplicateName(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
