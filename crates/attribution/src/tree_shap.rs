//! Path-dependent TreeSHAP
//!
//! Exact Shapley values for tree ensembles in polynomial time. Features left
//! out of a coalition are integrated out by following both branches of a
//! split, weighted by the training cover of each child.

use crate::breakdown::AttributionMethod;
use crate::path::Path;
use crate::{Attributor, ExplainError};
use inference_engine::{Forest, Node, Tree};
use std::sync::Arc;
use tracing::debug;

/// TreeSHAP explainer bound to one forest
#[derive(Debug, Clone)]
pub struct TreeShap {
    forest: Arc<Forest>,
    /// Expected model output over the training distribution
    baseline: f64,
    max_depth: usize,
}

impl TreeShap {
    /// Prepare an explainer, computing the baseline once.
    ///
    /// Every tree must carry covers, and every child of a split must have a
    /// strictly positive finite cover.
    pub fn new(forest: Arc<Forest>) -> Result<Self, ExplainError> {
        let mut baseline = forest.base_score();
        for (t, tree) in forest.trees().iter().enumerate() {
            let covers = tree.covers().ok_or_else(|| {
                ExplainError::MissingNodeStats(format!("tree {t} has no node covers"))
            })?;
            check_covers(t, tree, covers)?;
            baseline += expected_value(tree, covers);
        }

        let max_depth = forest.max_depth();
        debug!(
            "TreeSHAP ready: {} trees, max depth {}, baseline {:.6}",
            forest.n_trees(),
            max_depth,
            baseline
        );

        Ok(Self {
            forest,
            baseline,
            max_depth,
        })
    }

    /// Forest being explained
    pub fn forest(&self) -> &Forest {
        &self.forest
    }
}

fn check_covers(t: usize, tree: &Tree, covers: &[f64]) -> Result<(), ExplainError> {
    for node in tree.nodes() {
        if let Node::Split { left, right, .. } = *node {
            for child in [left, right] {
                let cover = covers[child];
                if !(cover.is_finite() && cover > 0.0) {
                    return Err(ExplainError::InvalidCover {
                        tree: t,
                        node: child,
                        cover,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Cover-weighted mean of the leaf values, computed bottom-up
fn expected_value(tree: &Tree, covers: &[f64]) -> f64 {
    let mut values = vec![0.0; tree.n_nodes()];
    for idx in (0..tree.n_nodes()).rev() {
        values[idx] = match *tree.node(idx) {
            Node::Leaf { value } => value,
            Node::Split { left, right, .. } => {
                let (cl, cr) = (covers[left], covers[right]);
                (cl * values[left] + cr * values[right]) / (cl + cr)
            }
        };
    }
    values[0]
}

struct Recursion<'a> {
    tree: &'a Tree,
    covers: &'a [f64],
    features: &'a [f64],
    phi: &'a mut [f64],
}

impl Recursion<'_> {
    fn walk(
        &mut self,
        idx: usize,
        mut path: Path,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        path.extend(feature, zero_fraction, one_fraction);

        match *self.tree.node(idx) {
            Node::Leaf { value } => {
                for i in 1..path.len() {
                    let element = path.element(i);
                    if let Some(f) = element.feature {
                        let weight = path.unwound_sum(i);
                        self.phi[f] +=
                            weight * (element.one_fraction - element.zero_fraction) * value;
                    }
                }
            }
            Node::Split {
                feature: split,
                left,
                right,
                ..
            } => {
                let hot = self
                    .tree
                    .next_child(idx, self.features)
                    .unwrap_or(left);
                let cold = if hot == left { right } else { left };

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                // A feature seen higher up the path is folded into one element
                if let Some(k) = path.find(split) {
                    let previous = path.element(k);
                    incoming_zero = previous.zero_fraction;
                    incoming_one = previous.one_fraction;
                    path.unwind(k);
                }

                let total = self.covers[left] + self.covers[right];
                let hot_fraction = self.covers[hot] / total;
                let cold_fraction = self.covers[cold] / total;

                self.walk(
                    hot,
                    path.clone(),
                    incoming_zero * hot_fraction,
                    incoming_one,
                    Some(split),
                );
                self.walk(cold, path, incoming_zero * cold_fraction, 0.0, Some(split));
            }
        }
    }
}

impl Attributor for TreeShap {
    fn method(&self) -> AttributionMethod {
        AttributionMethod::TreeShap
    }

    fn baseline(&self) -> f64 {
        self.baseline
    }

    fn attribute(&self, features: &[f64]) -> Result<Vec<f64>, ExplainError> {
        let n_features = self.forest.n_features();
        if features.len() != n_features {
            return Err(ExplainError::DimensionMismatch {
                expected: n_features,
                actual: features.len(),
            });
        }

        let mut phi = vec![0.0; n_features];
        for tree in self.forest.trees() {
            // Checked in `new`
            let Some(covers) = tree.covers() else {
                return Err(ExplainError::MissingNodeStats(
                    "tree lost its covers".to_string(),
                ));
            };
            let mut recursion = Recursion {
                tree,
                covers,
                features,
                phi: &mut phi,
            };
            recursion.walk(0, Path::with_capacity(self.max_depth + 1), 1.0, 1.0, None);
        }
        Ok(phi)
    }
}
