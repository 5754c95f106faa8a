//! Coalition Enumeration

use attribution::{AttributionMethod, Attributor, ExplainError};
use inference_engine::{Forest, Node, Tree};
use std::sync::Arc;
use tracing::{debug, info};

/// Largest number of distinct split features that will be enumerated
pub const MAX_ENUMERATED_FEATURES: usize = 16;

/// Exact Shapley values over all `2^m` coalitions of the `m` used features.
///
/// A feature outside the coalition is integrated out by averaging both
/// children of its splits. Children are weighted by training cover when the
/// tree carries usable covers, evenly otherwise.
#[derive(Debug, Clone)]
pub struct CoalitionExplainer {
    forest: Arc<Forest>,
    /// Features the forest splits on, ascending
    used: Vec<usize>,
    /// Bit position of each input feature, if used
    bits: Vec<Option<usize>>,
    /// Per tree, per node: share of the parent going left
    left_shares: Vec<Vec<f64>>,
    /// Shapley weight by coalition size
    weights: Vec<f64>,
    baseline: f64,
}

impl CoalitionExplainer {
    /// Prepare the explainer and its baseline
    pub fn new(forest: Arc<Forest>) -> Result<Self, ExplainError> {
        let mut used: Vec<usize> = forest
            .trees()
            .iter()
            .flat_map(|tree| tree.nodes().iter())
            .filter_map(|node| match node {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .collect();
        used.sort_unstable();
        used.dedup();

        if used.len() > MAX_ENUMERATED_FEATURES {
            return Err(ExplainError::TooManyFeatures {
                n_features: used.len(),
                max: MAX_ENUMERATED_FEATURES,
            });
        }

        let mut bits = vec![None; forest.n_features()];
        for (bit, &feature) in used.iter().enumerate() {
            bits[feature] = Some(bit);
        }

        let mut even_trees = 0;
        let left_shares: Vec<Vec<f64>> = forest
            .trees()
            .iter()
            .map(|tree| {
                let (shares, weighted) = split_shares(tree);
                if !weighted {
                    even_trees += 1;
                }
                shares
            })
            .collect();
        if even_trees > 0 {
            info!(
                "{} of {} trees lack usable covers; splitting them evenly",
                even_trees,
                forest.n_trees()
            );
        }

        let weights = shapley_weights(used.len());

        let mut explainer = Self {
            forest,
            used,
            bits,
            left_shares,
            weights,
            baseline: 0.0,
        };
        explainer.baseline = explainer.forest.base_score() + explainer.value(&[], 0);
        debug!(
            "Coalition explainer ready: {} used features, baseline {:.6}",
            explainer.used.len(),
            explainer.baseline
        );
        Ok(explainer)
    }

    /// Features the model splits on
    pub fn used_features(&self) -> &[usize] {
        &self.used
    }

    /// Sum of tree outputs when only features in `mask` are known
    fn value(&self, features: &[f64], mask: u32) -> f64 {
        self.forest
            .trees()
            .iter()
            .zip(&self.left_shares)
            .map(|(tree, shares)| self.conditional(tree, shares, 0, features, mask))
            .sum()
    }

    fn conditional(&self, tree: &Tree, shares: &[f64], idx: usize, features: &[f64], mask: u32) -> f64 {
        match *tree.node(idx) {
            Node::Leaf { value } => value,
            Node::Split {
                feature, left, right, ..
            } => {
                let known = self.bits[feature].is_some_and(|bit| mask & (1 << bit) != 0);
                if known {
                    let next = tree.next_child(idx, features).unwrap_or(left);
                    self.conditional(tree, shares, next, features, mask)
                } else {
                    let share = shares[idx];
                    share * self.conditional(tree, shares, left, features, mask)
                        + (1.0 - share) * self.conditional(tree, shares, right, features, mask)
                }
            }
        }
    }
}

/// Left share of every split node, and whether covers were used
fn split_shares(tree: &Tree) -> (Vec<f64>, bool) {
    let mut shares = vec![0.5; tree.n_nodes()];
    let Some(covers) = tree.covers() else {
        return (shares, false);
    };

    let usable = tree.nodes().iter().all(|node| match *node {
        Node::Split { left, right, .. } => [covers[left], covers[right]]
            .iter()
            .all(|c| c.is_finite() && *c > 0.0),
        Node::Leaf { .. } => true,
    });
    if !usable {
        return (shares, false);
    }

    for (idx, node) in tree.nodes().iter().enumerate() {
        if let Node::Split { left, right, .. } = *node {
            shares[idx] = covers[left] / (covers[left] + covers[right]);
        }
    }
    (shares, true)
}

/// `s! (m - s - 1)! / m!` for every coalition size `s < m`
fn shapley_weights(m: usize) -> Vec<f64> {
    (0..m)
        .map(|s| {
            // Binomial form avoids large factorials: 1 / (m * C(m-1, s))
            let mut binom = 1.0;
            for k in 0..s {
                binom = binom * (m - 1 - k) as f64 / (k + 1) as f64;
            }
            1.0 / (m as f64 * binom)
        })
        .collect()
}

impl Attributor for CoalitionExplainer {
    fn method(&self) -> AttributionMethod {
        AttributionMethod::CoalitionEnumeration
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

        let m = self.used.len();
        let values: Vec<f64> = (0..1u32 << m).map(|mask| self.value(features, mask)).collect();

        let mut phi = vec![0.0; n_features];
        for (bit, &feature) in self.used.iter().enumerate() {
            let flag = 1u32 << bit;
            let mut total = 0.0;
            for mask in (0..1u32 << m).filter(|mask| mask & flag == 0) {
                let size = mask.count_ones() as usize;
                total += self.weights[size] * (values[(mask | flag) as usize] - values[mask as usize]);
            }
            phi[feature] = total;
        }
        Ok(phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution::TreeShap;
    use inference_engine::load_model;
    use proptest::prelude::*;

    const FIXTURE: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/acl_stress_model.json"
    );

    fn fixture() -> Arc<Forest> {
        Arc::new(load_model(FIXTURE).unwrap().forest)
    }

    fn stump(feature: usize, low: f64, high: f64) -> Tree {
        Tree::new(vec![
            Node::Split {
                feature,
                threshold: 0.0,
                default_left: true,
                left: 1,
                right: 2,
            },
            Node::Leaf { value: low },
            Node::Leaf { value: high },
        ])
        .unwrap()
    }

    #[test]
    fn test_shapley_weights() {
        let w = shapley_weights(3);
        assert!((w[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((w[1] - 1.0 / 6.0).abs() < 1e-12);
        assert!((w[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!(shapley_weights(0).is_empty());
    }

    #[test]
    fn test_matches_tree_shap_on_fixture() {
        let forest = fixture();
        let exact = CoalitionExplainer::new(forest.clone()).unwrap();
        let shap = TreeShap::new(forest).unwrap();
        assert!((exact.baseline() - shap.baseline()).abs() < 1e-9);

        let x = [40.0, 60.0, 12.0, 9.0, 5.0, 30.0, -80.0, 350.0, 0.4];
        let a = exact.attribute(&x).unwrap();
        let b = shap.attribute(&x).unwrap();
        for (u, v) in a.iter().zip(&b) {
            assert!((u - v).abs() < 1e-9, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_works_without_covers() {
        let mut forest = Forest::new(2, 10.0);
        forest.push_tree(stump(0, -1.0, 1.0)).unwrap();
        forest.push_tree(stump(1, 2.0, 4.0)).unwrap();
        let forest = Arc::new(forest);

        assert!(TreeShap::new(forest.clone()).is_err());
        let exact = CoalitionExplainer::new(forest.clone()).unwrap();
        assert_eq!(exact.baseline(), 10.0 + 0.0 + 3.0);

        let x = [-1.0, 1.0];
        let phi = exact.attribute(&x).unwrap();
        assert!((phi[0] + 1.0).abs() < 1e-12);
        assert!((phi[1] - 1.0).abs() < 1e-12);
        assert!((exact.baseline() + phi.iter().sum::<f64>() - forest.predict(&x)).abs() < 1e-12);
    }

    #[test]
    fn test_unused_features_and_method() {
        let exact = CoalitionExplainer::new(fixture()).unwrap();
        assert_eq!(exact.method(), AttributionMethod::CoalitionEnumeration);
        assert_eq!(exact.used_features(), &[0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(exact.attribute(&[1.0; 9]).unwrap()[4], 0.0);
    }

    #[test]
    fn test_too_many_features() {
        let n = MAX_ENUMERATED_FEATURES + 1;
        let mut forest = Forest::new(n, 0.0);
        for f in 0..n {
            forest.push_tree(stump(f, 0.0, 1.0)).unwrap();
        }
        assert_eq!(
            CoalitionExplainer::new(Arc::new(forest)).unwrap_err(),
            ExplainError::TooManyFeatures {
                n_features: n,
                max: MAX_ENUMERATED_FEATURES
            }
        );
    }

    #[test]
    fn test_wrong_dimension() {
        let exact = CoalitionExplainer::new(fixture()).unwrap();
        assert!(matches!(
            exact.attribute(&[0.0; 10]),
            Err(ExplainError::DimensionMismatch { expected: 9, actual: 10 })
        ));
    }

    proptest! {
        #[test]
        fn prop_local_accuracy(x in prop::array::uniform9(-500.0f64..500.0)) {
            let forest = fixture();
            let exact = CoalitionExplainer::new(forest.clone()).unwrap();
            let phi = exact.attribute(&x).unwrap();
            let prediction = forest.predict(&x);
            let reconstructed = exact.baseline() + phi.iter().sum::<f64>();
            prop_assert!((reconstructed - prediction).abs() <= 1e-6 * prediction.abs().max(1.0));
        }
    }
}
