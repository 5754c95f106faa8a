//! Service Configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Model artifact looked up in the working directory by default
pub const DEFAULT_MODEL_PATH: &str = "final_XGJ_model.json";

/// Settings needed to construct a [`StressService`](crate::StressService)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path of the model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Input labels, nine entries in canonical order
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Short names used in explanations, nine entries in canonical order
    #[serde(default)]
    pub short_names: Option<Vec<String>>,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            labels: None,
            short_names: None,
        }
    }
}

impl ServiceConfig {
    /// Default configuration reading the model from `path`
    pub fn with_model_path(path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: path.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.model_path, PathBuf::from("final_XGJ_model.json"));
    }

    #[test]
    fn test_with_model_path() {
        let config = ServiceConfig::with_model_path("/models/acl.json");
        assert_eq!(config.model_path, PathBuf::from("/models/acl.json"));
        assert!(config.labels.is_none());
    }
}
