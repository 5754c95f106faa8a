//! XGBoost JSON Model Reader
//!
//! Parses the document written by `Booster.save_model("model.json")` and
//! converts it into a [`Forest`]. Only the fields needed for regression
//! inference and attribution are read; everything else is ignored.

use crate::forest::{Forest, Node, Tree};
use crate::InferenceError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::debug;

/// Objectives whose output is the raw margin (identity link)
const IDENTITY_OBJECTIVES: [&str; 4] = [
    "reg:squarederror",
    "reg:linear",
    "reg:pseudohubererror",
    "reg:absoluteerror",
];

/// Upper bound on `num_feature`; larger values mark a corrupt artifact
const MAX_FEATURES: i64 = 1 << 16;

/// XGBoost writes `base_score` as a number, a string, or a bracketed
/// one-element array string such as `"[5E-1]"` (2.1 and later).
fn deserialize_base_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let mut cur = Value::deserialize(deserializer)?;
    loop {
        match cur {
            Value::Number(n) => {
                return n.as_f64().ok_or_else(|| D::Error::custom("invalid base_score number"));
            }
            Value::String(s) => {
                let t = s.trim();
                if let Ok(f) = t.parse::<f64>() {
                    return Ok(f);
                }
                let inner = t.strip_prefix('[').and_then(|t| t.strip_suffix(']'));
                match inner {
                    Some(inner) => cur = Value::String(inner.split(',').next().unwrap_or("").to_string()),
                    None => {
                        return Err(D::Error::custom(format!("cannot parse base_score from {s:?}")));
                    }
                }
            }
            Value::Array(arr) => match arr.into_iter().next() {
                Some(first) => cur = first,
                None => return Err(D::Error::custom("empty base_score array")),
            },
            _ => return Err(D::Error::custom("base_score must be a number, string or array")),
        }
    }
}

/// `default_left` is stored as 0/1 integers by most versions, booleans by a few
fn deserialize_flags<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            other => Err(D::Error::custom(format!("invalid flag value {other}"))),
        })
        .collect()
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub num_nodes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XgbTree {
    pub tree_param: TreeParam,
    #[serde(default)]
    pub sum_hessian: Vec<f64>,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f32>,
    #[serde(default)]
    pub split_type: Vec<i32>,
    #[serde(deserialize_with = "deserialize_flags")]
    pub default_left: Vec<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<XgbTree>,
    #[serde(default)]
    pub tree_info: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GbTreeDefinition {
    pub model: ModelTrees,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree {
        model: ModelTrees,
    },
    Gblinear {},
    Dart {
        gbtree: GbTreeDefinition,
        #[serde(default)]
        weight_drop: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveConfig {
    pub name: String,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    pub base_score: f64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub num_feature: i64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub num_class: i64,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default = "default_num_target")]
    pub num_target: i64,
}

fn default_num_target() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Learner {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBooster,
    pub objective: ObjectiveConfig,
    pub learner_model_param: LearnerModelParam,
}

/// Top-level XGBoost JSON document
#[derive(Debug, Clone, Deserialize)]
pub struct XgbModel {
    #[serde(default)]
    pub version: Option<[u32; 3]>,
    pub learner: Learner,
}

impl XgbModel {
    /// Parse a JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self, InferenceError> {
        serde_json::from_slice(bytes)
            .map_err(|e| InferenceError::ModelLoadError(format!("invalid XGBoost JSON: {e}")))
    }

    /// Library version that wrote the document, as `major.minor.patch`
    pub fn version_string(&self) -> Option<String> {
        self.version.map(|[a, b, c]| format!("{a}.{b}.{c}"))
    }

    /// Objective name
    pub fn objective(&self) -> &str {
        &self.learner.objective.name
    }

    /// Convert to a native forest.
    ///
    /// Fails for anything that is not a single-output, numeric-split,
    /// identity-link tree regressor.
    pub fn to_forest(&self) -> Result<Forest, InferenceError> {
        let learner = &self.learner;
        let param = &learner.learner_model_param;

        if !IDENTITY_OBJECTIVES.contains(&learner.objective.name.as_str()) {
            return Err(InferenceError::InvalidModel(format!(
                "unsupported objective {:?}; expected one of {:?}",
                learner.objective.name, IDENTITY_OBJECTIVES
            )));
        }
        if param.num_class > 1 || param.num_target > 1 {
            return Err(InferenceError::InvalidModel(format!(
                "multi-output models are not supported (num_class={}, num_target={})",
                param.num_class, param.num_target
            )));
        }
        if param.num_feature <= 0 || param.num_feature > MAX_FEATURES {
            return Err(InferenceError::InvalidModel(format!(
                "invalid num_feature {}",
                param.num_feature
            )));
        }

        let (model, weights) = match &learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (&gbtree.model, Some(weight_drop)),
            GradientBooster::Gblinear {} => {
                return Err(InferenceError::InvalidModel(
                    "gblinear boosters have no trees to explain".to_string(),
                ));
            }
        };

        if model.tree_info.iter().any(|&group| group != 0) {
            return Err(InferenceError::InvalidModel(
                "trees assigned to more than one output group".to_string(),
            ));
        }

        let mut forest = Forest::new(param.num_feature as usize, param.base_score)
            .with_feature_names(learner.feature_names.clone());

        for (idx, xgb_tree) in model.trees.iter().enumerate() {
            let tree = convert_tree(xgb_tree).map_err(|e| match e {
                InferenceError::InvalidModel(msg) => {
                    InferenceError::InvalidModel(format!("tree {idx}: {msg}"))
                }
                other => other,
            })?;
            let tree = match weights {
                Some(weights) => {
                    let weight = weights.get(idx).copied().unwrap_or(1.0);
                    tree.scaled(weight)
                }
                None => tree,
            };
            forest.push_tree(tree)?;
        }

        debug!(
            "Converted XGBoost model: {} trees, {} features, base_score={}",
            forest.n_trees(),
            forest.n_features(),
            forest.base_score()
        );
        Ok(forest)
    }
}

/// Convert one tree, renumbering nodes in depth-first order from the root.
///
/// Renumbering drops nodes deleted by pruning, which XGBoost keeps in its
/// arrays but never reaches.
fn convert_tree(xgb: &XgbTree) -> Result<Tree, InferenceError> {
    let n = xgb.tree_param.num_nodes as usize;
    if n == 0 {
        return Err(InferenceError::InvalidModel("tree has no nodes".to_string()));
    }
    for (name, len) in [
        ("left_children", xgb.left_children.len()),
        ("right_children", xgb.right_children.len()),
        ("split_indices", xgb.split_indices.len()),
        ("split_conditions", xgb.split_conditions.len()),
        ("default_left", xgb.default_left.len()),
    ] {
        if len < n {
            return Err(InferenceError::InvalidModel(format!(
                "{name} has {len} entries for {n} nodes"
            )));
        }
    }
    let has_covers = xgb.sum_hessian.len() >= n;

    let mut nodes = Vec::with_capacity(n);
    let mut covers = Vec::with_capacity(n);
    // (source index, slot in `nodes` to patch with the new index, is left child)
    let mut stack: Vec<(usize, Option<(usize, bool)>)> = vec![(0, None)];
    let mut visited = vec![false; n];

    while let Some((src, parent)) = stack.pop() {
        if src >= n || visited[src] {
            return Err(InferenceError::InvalidModel(format!(
                "node {src} is out of range or reached twice"
            )));
        }
        visited[src] = true;

        let new_idx = nodes.len();
        if let Some((parent_idx, is_left)) = parent {
            if let Node::Split { left, right, .. } = &mut nodes[parent_idx] {
                if is_left {
                    *left = new_idx;
                } else {
                    *right = new_idx;
                }
            }
        }

        let left = xgb.left_children[src];
        if left == -1 {
            nodes.push(Node::Leaf {
                value: xgb.split_conditions[src] as f64,
            });
        } else {
            if xgb.split_type.get(src).copied().unwrap_or(0) != 0 {
                return Err(InferenceError::InvalidModel(format!(
                    "node {src} is a categorical split"
                )));
            }
            let right = xgb.right_children[src];
            if left < 0 || right < 0 {
                return Err(InferenceError::InvalidModel(format!(
                    "node {src} has invalid children ({left}, {right})"
                )));
            }
            let feature = xgb.split_indices[src];
            if feature < 0 {
                return Err(InferenceError::InvalidModel(format!(
                    "node {src} splits on feature {feature}"
                )));
            }
            nodes.push(Node::Split {
                feature: feature as usize,
                threshold: xgb.split_conditions[src],
                default_left: xgb.default_left[src],
                left: 0,
                right: 0,
            });
            // Right pushed first so the left subtree is numbered first
            stack.push((right as usize, Some((new_idx, false))));
            stack.push((left as usize, Some((new_idx, true))));
        }

        if has_covers {
            covers.push(xgb.sum_hessian[src]);
        }
    }

    let tree = Tree::new(nodes)?;
    if has_covers {
        tree.with_covers(covers)
    } else {
        Ok(tree)
    }
}
