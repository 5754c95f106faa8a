//! Data Validation
//!
//! Provides length and finiteness checks for feature vectors, and parsing of
//! free-form decimal fields as typed into a form.

mod error;
mod parse;
mod validator;

pub use error::ValidationError;
pub use parse::parse_decimal;
pub use validator::{ValidationConfig, Validator};
