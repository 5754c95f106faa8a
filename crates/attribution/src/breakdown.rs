//! Attribution Breakdown

use crate::ExplainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative tolerance for `baseline + Σ contributions == prediction`
pub const LOCAL_ACCURACY_TOLERANCE: f64 = 1e-6;

/// Algorithm that produced an attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Exact path-dependent TreeSHAP
    TreeShap,
    /// Exact Shapley values by enumerating every feature coalition
    CoalitionEnumeration,
}

impl AttributionMethod {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionMethod::TreeShap => "tree_shap",
            AttributionMethod::CoalitionEnumeration => "coalition_enumeration",
        }
    }
}

impl fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contribution of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Canonical position of the feature in the input vector
    pub index: usize,
    /// Display name of the feature
    pub feature: String,
    /// Signed contribution to the prediction
    pub value: f64,
}

/// Additive explanation of one prediction.
///
/// Contributions are kept in canonical feature order. The baseline plus the
/// sum of contributions reconstructs the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionBreakdown {
    baseline: f64,
    contributions: Vec<Contribution>,
    method: AttributionMethod,
    used_fallback: bool,
}

impl AttributionBreakdown {
    /// Pair raw attribution values with feature names
    pub fn new(
        baseline: f64,
        values: &[f64],
        names: &[String],
        method: AttributionMethod,
        used_fallback: bool,
    ) -> Result<Self, ExplainError> {
        if values.len() != names.len() {
            return Err(ExplainError::DimensionMismatch {
                expected: names.len(),
                actual: values.len(),
            });
        }

        let contributions = values
            .iter()
            .zip(names)
            .enumerate()
            .map(|(index, (&value, name))| Contribution {
                index,
                feature: name.clone(),
                value,
            })
            .collect();

        Ok(Self {
            baseline,
            contributions,
            method,
            used_fallback,
        })
    }

    /// Rebuild from rows in any order (e.g. [`to_display_rows`](Self::to_display_rows)).
    ///
    /// Row indices must be exactly `0..rows.len()`.
    pub fn from_display_rows(
        baseline: f64,
        mut rows: Vec<Contribution>,
        method: AttributionMethod,
        used_fallback: bool,
    ) -> Result<Self, ExplainError> {
        rows.sort_by_key(|row| row.index);
        if let Some(pos) = rows.iter().enumerate().position(|(i, row)| row.index != i) {
            return Err(ExplainError::DimensionMismatch {
                expected: pos,
                actual: rows[pos].index,
            });
        }

        Ok(Self {
            baseline,
            contributions: rows,
            method,
            used_fallback,
        })
    }

    /// Expected model output
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Contributions in canonical order
    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    /// Method that produced this breakdown
    pub fn method(&self) -> AttributionMethod {
        self.method
    }

    /// Whether the secondary method was used
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    /// Contribution of a feature by name
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.value)
    }

    /// Contribution at a canonical index
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.contributions.get(index).map(|c| c.value)
    }

    /// Sum of all contributions
    pub fn total(&self) -> f64 {
        self.contributions.iter().map(|c| c.value).sum()
    }

    /// Baseline plus all contributions
    pub fn reconstructed(&self) -> f64 {
        self.baseline + self.total()
    }

    /// Check that this breakdown reconstructs `prediction`
    pub fn check_local_accuracy(&self, prediction: f64) -> Result<(), ExplainError> {
        let reconstructed = self.reconstructed();
        let tolerance = LOCAL_ACCURACY_TOLERANCE * prediction.abs().max(1.0);
        if !((reconstructed - prediction).abs() <= tolerance) {
            return Err(ExplainError::LocalAccuracy {
                reconstructed,
                prediction,
            });
        }
        Ok(())
    }

    /// Contributions ordered for display: largest magnitude first, ties by
    /// canonical index
    pub fn to_display_rows(&self) -> Vec<Contribution> {
        let mut rows = self.contributions.clone();
        rows.sort_by(|a, b| {
            b.value
                .abs()
                .total_cmp(&a.value.abs())
                .then(a.index.cmp(&b.index))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("F{i}")).collect()
    }

    fn sample() -> AttributionBreakdown {
        AttributionBreakdown::new(
            10.0,
            &[0.5, -2.0, 0.0, 2.0],
            &names(4),
            AttributionMethod::TreeShap,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_new_checks_lengths() {
        let err = AttributionBreakdown::new(0.0, &[1.0], &names(2), AttributionMethod::TreeShap, false)
            .unwrap_err();
        assert_eq!(err, ExplainError::DimensionMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn test_totals() {
        let breakdown = sample();
        assert_eq!(breakdown.total(), 0.5);
        assert_eq!(breakdown.reconstructed(), 10.5);
        assert_eq!(breakdown.get("F1"), Some(-2.0));
        assert_eq!(breakdown.get("missing"), None);
        assert_eq!(breakdown.value_at(3), Some(2.0));
    }

    #[test]
    fn test_local_accuracy_check() {
        let breakdown = sample();
        assert!(breakdown.check_local_accuracy(10.5).is_ok());
        assert!(breakdown.check_local_accuracy(10.5 + 1e-9).is_ok());
        assert!(matches!(
            breakdown.check_local_accuracy(11.0),
            Err(ExplainError::LocalAccuracy { .. })
        ));
        assert!(breakdown.check_local_accuracy(f64::NAN).is_err());
    }

    #[test]
    fn test_display_rows_ordering() {
        let rows = sample().to_display_rows();
        let order: Vec<usize> = rows.iter().map(|r| r.index).collect();
        // |-2.0| ties with |2.0|; lower canonical index first
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_display_rows_round_trip() {
        let breakdown = sample();
        let rows = breakdown.to_display_rows();
        let back =
            AttributionBreakdown::from_display_rows(breakdown.baseline(), rows, breakdown.method(), false)
                .unwrap();
        assert_eq!(back, breakdown);
        for c in breakdown.contributions() {
            assert_eq!(back.get(&c.feature).map(f64::to_bits), Some(c.value.to_bits()));
        }
    }

    #[test]
    fn test_from_display_rows_rejects_gaps() {
        let mut rows = sample().to_display_rows();
        rows.retain(|r| r.index != 2);
        assert!(AttributionBreakdown::from_display_rows(0.0, rows, AttributionMethod::TreeShap, false).is_err());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["method"], "tree_shap");
        assert_eq!(json["used_fallback"], false);
        assert_eq!(json["contributions"][1]["feature"], "F1");
        let back: AttributionBreakdown = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
