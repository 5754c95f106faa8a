//! Model Artifact Loading
//!
//! Two on-disk formats are recognised by content:
//! - native snapshot: `ACLF` magic, little-endian `u16` format version,
//!   postcard-encoded [`Snapshot`]
//! - XGBoost JSON as written by `Booster.save_model("*.json")`

use crate::forest::Forest;
use crate::xgboost::XgbModel;
use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Magic bytes opening a native snapshot
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"ACLF";

/// Current native snapshot version
pub const SNAPSHOT_VERSION: u16 = 1;

/// Artifact format a model was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFormat {
    /// XGBoost JSON document
    XgboostJson,
    /// Native postcard snapshot
    Snapshot,
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::XgboostJson => f.write_str("xgboost-json"),
            ModelFormat::Snapshot => f.write_str("snapshot"),
        }
    }
}

/// Descriptive metadata of a loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Format the artifact was read from
    pub format: ModelFormat,
    /// Version of the library that produced the model, if recorded
    pub library_version: Option<String>,
    /// Training objective
    pub objective: String,
    /// Number of trees
    pub n_trees: usize,
    /// Number of input features
    pub n_features: usize,
    /// Constant added to tree outputs
    pub base_score: f64,
}

impl ModelInfo {
    fn describe(forest: &Forest, format: ModelFormat, objective: String, library_version: Option<String>) -> Self {
        Self {
            format,
            library_version,
            objective,
            n_trees: forest.n_trees(),
            n_features: forest.n_features(),
            base_score: forest.base_score(),
        }
    }
}

/// A model read from disk together with its metadata
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub forest: Forest,
    pub info: ModelInfo,
}

/// Payload of a native snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub forest: Forest,
    pub objective: String,
    pub library_version: Option<String>,
}

/// Load a model artifact from `path`.
///
/// Every failure, including structural problems found while converting the
/// model, is reported as [`InferenceError::ModelLoadError`].
pub fn load_model(path: impl AsRef<Path>) -> Result<LoadedModel, InferenceError> {
    let path = path.as_ref();
    info!("Loading model artifact from {}", path.display());

    let bytes = std::fs::read(path).map_err(|e| {
        InferenceError::ModelLoadError(format!("cannot read {}: {e}", path.display()))
    })?;

    parse_model(&bytes).map_err(|e| match e {
        InferenceError::ModelLoadError(msg) | InferenceError::InvalidModel(msg) => {
            InferenceError::ModelLoadError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Parse an in-memory model artifact
pub fn parse_model(bytes: &[u8]) -> Result<LoadedModel, InferenceError> {
    if bytes.starts_with(SNAPSHOT_MAGIC) {
        return decode_snapshot(bytes);
    }

    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        Some(b'{') => {
            let model = XgbModel::from_slice(bytes)?;
            let forest = model.to_forest()?;
            let info = ModelInfo::describe(
                &forest,
                ModelFormat::XgboostJson,
                model.objective().to_string(),
                model.version_string(),
            );
            debug!("Parsed XGBoost JSON model: {:?}", info);
            Ok(LoadedModel { forest, info })
        }
        Some(_) => Err(InferenceError::ModelLoadError(
            "unrecognised artifact format (expected XGBoost JSON or a native snapshot; \
             pickled and UBJSON models must be re-saved as JSON)"
                .to_string(),
        )),
        None => Err(InferenceError::ModelLoadError("artifact is empty".to_string())),
    }
}

fn decode_snapshot(bytes: &[u8]) -> Result<LoadedModel, InferenceError> {
    let header = SNAPSHOT_MAGIC.len() + 2;
    if bytes.len() < header {
        return Err(InferenceError::ModelLoadError("truncated snapshot header".to_string()));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(InferenceError::ModelLoadError(format!(
            "snapshot version {version} is not supported (expected {SNAPSHOT_VERSION})"
        )));
    }

    let snapshot: Snapshot = postcard::from_bytes(&bytes[header..])
        .map_err(|e| InferenceError::ModelLoadError(format!("corrupt snapshot: {e}")))?;

    // Decoded trees bypass the constructors, so re-check their structure
    let mut forest = Forest::new(snapshot.forest.n_features(), snapshot.forest.base_score())
        .with_feature_names(snapshot.forest.feature_names().to_vec());
    for tree in snapshot.forest.trees() {
        let mut checked = crate::forest::Tree::new(tree.nodes().to_vec())?;
        if let Some(covers) = tree.covers() {
            checked = checked.with_covers(covers.to_vec())?;
        }
        forest.push_tree(checked)?;
    }

    let info = ModelInfo::describe(
        &forest,
        ModelFormat::Snapshot,
        snapshot.objective,
        snapshot.library_version,
    );
    Ok(LoadedModel { forest, info })
}

/// Encode a model as a native snapshot
pub fn encode_snapshot(model: &LoadedModel) -> Result<Vec<u8>, InferenceError> {
    let snapshot = Snapshot {
        forest: model.forest.clone(),
        objective: model.info.objective.clone(),
        library_version: model.info.library_version.clone(),
    };

    let payload = postcard::to_allocvec(&snapshot)
        .map_err(|e| InferenceError::ModelLoadError(format!("cannot encode snapshot: {e}")))?;

    let mut bytes = Vec::with_capacity(payload.len() + 6);
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{Node, Tree};
    use std::io::Write;

    fn sample_model() -> LoadedModel {
        let tree = Tree::new(vec![
            Node::Split {
                feature: 0,
                threshold: 1.0,
                default_left: false,
                left: 1,
                right: 2,
            },
            Node::Leaf { value: -1.0 },
            Node::Leaf { value: 2.0 },
        ])
        .unwrap()
        .with_covers(vec![3.0, 1.0, 2.0])
        .unwrap();
        let mut forest = Forest::new(1, 0.5);
        forest.push_tree(tree).unwrap();
        let info = ModelInfo::describe(&forest, ModelFormat::Snapshot, "reg:squarederror".to_string(), None);
        LoadedModel { forest, info }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let model = sample_model();
        let bytes = encode_snapshot(&model).unwrap();
        assert!(bytes.starts_with(SNAPSHOT_MAGIC));

        let loaded = parse_model(&bytes).unwrap();
        assert_eq!(loaded.forest, model.forest);
        assert_eq!(loaded.info.format, ModelFormat::Snapshot);
        assert_eq!(loaded.info.objective, "reg:squarederror");
    }

    #[test]
    fn test_corrupt_snapshot() {
        let mut bytes = encode_snapshot(&sample_model()).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(parse_model(&bytes), Err(InferenceError::ModelLoadError(_))));
    }

    #[test]
    fn test_unknown_snapshot_version() {
        let mut bytes = encode_snapshot(&sample_model()).unwrap();
        bytes[4] = 9;
        let err = parse_model(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(parse_model(b"\x80\x04\x95 pickle").is_err());
        assert!(parse_model(b"   \n").is_err());
        assert!(parse_model(b"{ not json").is_err());
    }

    #[test]
    fn test_missing_file_is_model_load_error() {
        let err = load_model("/nonexistent/final_model.json").unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoadError(_)));
    }

    #[test]
    fn test_load_from_disk_wraps_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"{\"learner\": 5}").unwrap();

        let err = load_model(&path).unwrap_err();
        match err {
            InferenceError::ModelLoadError(msg) => assert!(msg.contains("broken.json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
