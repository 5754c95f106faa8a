//! HTTP Routes

pub mod page;
pub mod predictions;
