//! Application Settings
//!
//! Read from an optional `acl-stress.toml` in the working directory, then
//! overridden by `ACL__*` environment variables (`ACL__MODEL_PATH`,
//! `ACL__PLOT__MAX_DISPLAY`, ...).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stress_service::{ServiceConfig, DEFAULT_MODEL_PATH};

/// Settings file looked up when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "acl-stress";

/// Chart appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Rows shown in the waterfall chart; the rest are merged into one
    pub max_display: usize,
    /// Chart width in pixels
    pub width: u32,
    /// Colour of contributions raising the prediction
    pub positive_color: String,
    /// Colour of contributions lowering the prediction
    pub negative_color: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            max_display: 10,
            width: 720,
            positive_color: "#ff0051".to_string(),
            negative_color: "#008bfb".to_string(),
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model artifact path
    pub model_path: PathBuf,
    /// Listen address
    pub bind_addr: String,
    /// Maximum log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Input labels override
    pub labels: Option<Vec<String>>,
    /// Short names override
    pub short_names: Option<Vec<String>>,
    /// Chart appearance
    pub plot: PlotConfig,
    /// Decimals shown for the prediction
    pub decimals: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            labels: None,
            short_names: None,
            plot: PlotConfig::default(),
            decimals: 3,
        }
    }
}

impl Settings {
    /// Load from `acl-stress.toml` (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name(DEFAULT_SETTINGS_FILE).required(false))
    }

    /// Load from a specific file and the environment
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).required(true))
    }

    fn build<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("ACL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        if self.plot.max_display == 0 {
            return Err(ConfigError::Message(
                "plot.max_display must be at least 1".to_string(),
            ));
        }
        self.decimals = self.decimals.min(12);
        Ok(self)
    }

    /// Settings handed to the service
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            model_path: self.model_path.clone(),
            labels: self.labels.clone(),
            short_names: self.short_names.clone(),
        }
    }
}
