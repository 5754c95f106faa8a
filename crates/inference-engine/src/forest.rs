//! Tree Ensemble Representation

use crate::InferenceError;
use serde::{Deserialize, Serialize};

/// A node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Numeric split: go left when `value < threshold`
    Split {
        /// Index into the feature vector
        feature: usize,
        /// Split threshold, compared in f32 precision
        threshold: f32,
        /// Direction taken for missing (NaN) values
        default_left: bool,
        /// Left child node index
        left: usize,
        /// Right child node index
        right: usize,
    },
    /// Terminal node
    Leaf {
        /// Output value
        value: f64,
    },
}

impl Node {
    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// Decide the direction of a split for one feature value.
///
/// Values are compared after conversion to f32, the precision thresholds are
/// trained in. NaN follows the default direction.
#[inline]
pub fn goes_left(value: f64, threshold: f32, default_left: bool) -> bool {
    if value.is_nan() {
        default_left
    } else {
        (value as f32) < threshold
    }
}

/// A single regression tree.
///
/// Nodes are stored so that every child index is greater than its parent's,
/// with the root at index 0. Covers, when present, hold the training hessian
/// sum reaching each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    covers: Option<Vec<f64>>,
}

impl Tree {
    /// Create a tree, checking its structure
    pub fn new(nodes: Vec<Node>) -> Result<Self, InferenceError> {
        if nodes.is_empty() {
            return Err(InferenceError::InvalidModel("tree has no nodes".to_string()));
        }

        let mut parents = vec![0usize; nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            match *node {
                Node::Split {
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if threshold.is_nan() {
                        return Err(InferenceError::InvalidModel(format!(
                            "node {idx} has a NaN threshold"
                        )));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= nodes.len() {
                            return Err(InferenceError::InvalidModel(format!(
                                "node {idx} references child {child} in a tree of {} nodes",
                                nodes.len()
                            )));
                        }
                        parents[child] += 1;
                    }
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(InferenceError::InvalidModel(format!(
                            "leaf {idx} has non-finite value {value}"
                        )));
                    }
                }
            }
        }

        // Every node but the root must be reached exactly once
        if let Some(orphan) = parents.iter().skip(1).position(|&count| count != 1) {
            return Err(InferenceError::InvalidModel(format!(
                "node {} is referenced {} times",
                orphan + 1,
                parents[orphan + 1]
            )));
        }

        Ok(Self { nodes, covers: None })
    }

    /// Attach per-node covers
    pub fn with_covers(mut self, covers: Vec<f64>) -> Result<Self, InferenceError> {
        if covers.len() != self.nodes.len() {
            return Err(InferenceError::InvalidModel(format!(
                "{} covers for {} nodes",
                covers.len(),
                self.nodes.len()
            )));
        }
        self.covers = Some(covers);
        Ok(self)
    }

    /// Multiply every leaf value by `weight`
    pub fn scaled(mut self, weight: f64) -> Self {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= weight;
            }
        }
        self
    }

    /// All nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node at `idx`
    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Number of nodes
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Per-node covers, if the tree carries them
    pub fn covers(&self) -> Option<&[f64]> {
        self.covers.as_deref()
    }

    /// Whether covers are attached
    pub fn has_covers(&self) -> bool {
        self.covers.is_some()
    }

    /// Child that `features` is routed to from split node `idx`.
    ///
    /// Returns `None` for leaves.
    pub fn next_child(&self, idx: usize, features: &[f64]) -> Option<usize> {
        match self.nodes[idx] {
            Node::Split {
                feature,
                threshold,
                default_left,
                left,
                right,
            } => {
                let value = features.get(feature).copied().unwrap_or(f64::NAN);
                Some(if goes_left(value, threshold, default_left) {
                    left
                } else {
                    right
                })
            }
            Node::Leaf { .. } => None,
        }
    }

    /// Index of the leaf `features` lands in
    pub fn leaf_index(&self, features: &[f64]) -> usize {
        let mut idx = 0;
        while let Some(next) = self.next_child(idx, features) {
            idx = next;
        }
        idx
    }

    /// Output of this tree for `features`
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self.nodes[self.leaf_index(features)] {
            Node::Leaf { value } => value,
            Node::Split { .. } => unreachable!("leaf_index always stops at a leaf"),
        }
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut depths = vec![1usize; self.nodes.len()];
        let mut max = 1;
        for idx in 0..self.nodes.len() {
            if let Node::Split { left, right, .. } = self.nodes[idx] {
                depths[left] = depths[idx] + 1;
                depths[right] = depths[idx] + 1;
                max = max.max(depths[idx] + 1);
            }
        }
        max
    }

    /// Largest feature index used by a split
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

/// Additive ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    trees: Vec<Tree>,
    base_score: f64,
    n_features: usize,
    feature_names: Vec<String>,
}

impl Forest {
    /// Empty forest over `n_features` inputs
    pub fn new(n_features: usize, base_score: f64) -> Self {
        Self {
            trees: Vec::new(),
            base_score,
            n_features,
            feature_names: Vec::new(),
        }
    }

    /// Attach the feature names recorded at training time
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = names;
        self
    }

    /// Add a tree, checking it only splits on known features
    pub fn push_tree(&mut self, tree: Tree) -> Result<(), InferenceError> {
        if let Some(feature) = tree.max_feature() {
            if feature >= self.n_features {
                return Err(InferenceError::InvalidModel(format!(
                    "tree {} splits on feature {feature} but the model has {} features",
                    self.trees.len(),
                    self.n_features
                )));
            }
        }
        self.trees.push(tree);
        Ok(())
    }

    /// Trees in the ensemble
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Constant added to the sum of tree outputs
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Number of input features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Feature names recorded at training time (may be empty)
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Longest tree depth in the ensemble
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Raw regression output.
    ///
    /// Callers are responsible for passing `n_features` values.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(feature: usize, threshold: f32, left: usize, right: usize) -> Node {
        Node::Split {
            feature,
            threshold,
            default_left: true,
            left,
            right,
        }
    }

    fn leaf(value: f64) -> Node {
        Node::Leaf { value }
    }

    fn sample_tree() -> Tree {
        // x0 < 1.0 ? (x1 < 0.5 ? 1 : 2) : 3
        Tree::new(vec![
            split(0, 1.0, 1, 2),
            split(1, 0.5, 3, 4),
            leaf(3.0),
            leaf(1.0),
            leaf(2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_tree_routing() {
        let tree = sample_tree();
        assert_eq!(tree.predict(&[0.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[0.0, 0.7]), 2.0);
        assert_eq!(tree.predict(&[1.0, 0.0]), 3.0);
        // NaN follows default_left
        assert_eq!(tree.predict(&[f64::NAN, 0.7]), 2.0);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.max_feature(), Some(1));
    }

    #[test]
    fn test_threshold_compares_in_f32() {
        let threshold = 0.1f32;
        // Slightly above the f32 threshold in f64, but rounds to it in f32
        let value = threshold as f64 + 1e-12;
        assert!(!goes_left(value, threshold, true));
        assert!(goes_left(threshold as f64 - 1e-3, threshold, false));
    }

    #[test]
    fn test_rejects_bad_structure() {
        assert!(Tree::new(vec![]).is_err());
        // child index pointing backwards
        assert!(Tree::new(vec![split(0, 1.0, 0, 1), leaf(1.0)]).is_err());
        // child out of range
        assert!(Tree::new(vec![split(0, 1.0, 1, 5), leaf(1.0)]).is_err());
        // unreachable node
        assert!(Tree::new(vec![split(0, 1.0, 1, 2), leaf(1.0), leaf(2.0), leaf(3.0)]).is_err());
        // shared child
        assert!(Tree::new(vec![split(0, 1.0, 1, 1), leaf(1.0)]).is_err());
        // non-finite leaf
        assert!(Tree::new(vec![leaf(f64::INFINITY)]).is_err());
    }

    #[test]
    fn test_covers_length_checked() {
        assert!(sample_tree().with_covers(vec![1.0; 4]).is_err());
        let tree = sample_tree().with_covers(vec![10.0, 6.0, 4.0, 3.0, 3.0]).unwrap();
        assert!(tree.has_covers());
        assert_eq!(tree.covers().map(|c| c[1]), Some(6.0));
    }

    #[test]
    fn test_forest_sums_trees() {
        let mut forest = Forest::new(2, 0.5);
        forest.push_tree(sample_tree()).unwrap();
        forest.push_tree(sample_tree().scaled(0.5)).unwrap();
        assert_eq!(forest.n_trees(), 2);
        assert_eq!(forest.predict(&[0.0, 0.0]), 0.5 + 1.0 + 0.5);
        assert_eq!(forest.max_depth(), 3);
    }

    #[test]
    fn test_forest_rejects_unknown_feature() {
        let mut forest = Forest::new(1, 0.0);
        assert!(matches!(
            forest.push_tree(sample_tree()),
            Err(InferenceError::InvalidModel(_))
        ));
    }
}
