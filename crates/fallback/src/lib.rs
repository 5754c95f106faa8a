//! Fallback Attribution
//!
//! Exact Shapley values computed by enumerating every coalition of the
//! features a model actually splits on. Slower than TreeSHAP but tolerant
//! of models without usable node covers.

mod coalition;

pub use coalition::{CoalitionExplainer, MAX_ENUMERATED_FEATURES};
