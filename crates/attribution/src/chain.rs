//! Primary/Fallback Attribution Chain

use crate::breakdown::AttributionBreakdown;
use crate::{Attributor, ExplainError};
use tracing::{debug, warn};

/// Runs a primary attribution method and falls back to a secondary one.
///
/// A method that could not be prepared for the model (for instance because
/// the trees carry no covers) is kept as the reason it is unavailable, so a
/// request can still report why both methods failed.
pub struct AttributionChain {
    primary: Result<Box<dyn Attributor>, String>,
    fallback: Result<Box<dyn Attributor>, String>,
}

impl AttributionChain {
    /// Create a chain from the outcome of preparing each method
    pub fn new(
        primary: Result<Box<dyn Attributor>, ExplainError>,
        fallback: Result<Box<dyn Attributor>, ExplainError>,
    ) -> Self {
        if let Err(e) = &primary {
            warn!("Primary attribution method unavailable: {}", e);
        }
        if let Err(e) = &fallback {
            warn!("Fallback attribution method unavailable: {}", e);
        }

        Self {
            primary: primary.map_err(|e| e.to_string()),
            fallback: fallback.map_err(|e| e.to_string()),
        }
    }

    /// Whether the primary method could be prepared
    pub fn primary_available(&self) -> bool {
        self.primary.is_ok()
    }

    /// Whether the fallback method could be prepared
    pub fn fallback_available(&self) -> bool {
        self.fallback.is_ok()
    }

    /// Explain `prediction` for `features`.
    ///
    /// Each method's output is accepted only if it reconstructs the
    /// prediction. Output of the secondary method is tagged `used_fallback`.
    pub fn explain(
        &self,
        features: &[f64],
        prediction: f64,
        names: &[String],
    ) -> Result<AttributionBreakdown, ExplainError> {
        let primary = match &self.primary {
            Ok(method) => match run(method.as_ref(), features, prediction, names, false) {
                Ok(breakdown) => return Ok(breakdown),
                Err(e) => e.to_string(),
            },
            Err(reason) => reason.clone(),
        };

        warn!("Primary attribution failed, using fallback: {}", primary);

        match &self.fallback {
            Ok(method) => run(method.as_ref(), features, prediction, names, true).map_err(|e| {
                ExplainError::Unavailable {
                    primary,
                    fallback: e.to_string(),
                }
            }),
            Err(reason) => Err(ExplainError::Unavailable {
                primary,
                fallback: reason.clone(),
            }),
        }
    }
}

fn run(
    method: &dyn Attributor,
    features: &[f64],
    prediction: f64,
    names: &[String],
    used_fallback: bool,
) -> Result<AttributionBreakdown, ExplainError> {
    let values = method.attribute(features)?;
    let breakdown = AttributionBreakdown::new(
        method.baseline(),
        &values,
        names,
        method.method(),
        used_fallback,
    )?;
    breakdown.check_local_accuracy(prediction)?;
    debug!(
        "{} attribution: baseline {:.6}, total {:.6}",
        method.method(),
        breakdown.baseline(),
        breakdown.total()
    );
    Ok(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributionMethod;

    /// Attributor returning fixed values
    struct Fixed {
        method: AttributionMethod,
        baseline: f64,
        values: Result<Vec<f64>, ExplainError>,
    }

    impl Attributor for Fixed {
        fn method(&self) -> AttributionMethod {
            self.method
        }

        fn baseline(&self) -> f64 {
            self.baseline
        }

        fn attribute(&self, _features: &[f64]) -> Result<Vec<f64>, ExplainError> {
            self.values.clone()
        }
    }

    fn fixed(
        method: AttributionMethod,
        values: Result<Vec<f64>, ExplainError>,
    ) -> Result<Box<dyn Attributor>, ExplainError> {
        Ok(Box::new(Fixed {
            method,
            baseline: 1.0,
            values,
        }))
    }

    fn names() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_primary_used_when_it_works() {
        let chain = AttributionChain::new(
            fixed(AttributionMethod::TreeShap, Ok(vec![0.5, 1.5])),
            fixed(AttributionMethod::CoalitionEnumeration, Ok(vec![2.0, 0.0])),
        );
        let breakdown = chain.explain(&[0.0, 0.0], 3.0, &names()).unwrap();
        assert_eq!(breakdown.method(), AttributionMethod::TreeShap);
        assert!(!breakdown.used_fallback());
        assert_eq!(breakdown.get("B"), Some(1.5));
    }

    #[test]
    fn test_fallback_on_primary_error() {
        let chain = AttributionChain::new(
            fixed(
                AttributionMethod::TreeShap,
                Err(ExplainError::MissingNodeStats("no covers".to_string())),
            ),
            fixed(AttributionMethod::CoalitionEnumeration, Ok(vec![2.0, 0.0])),
        );
        let breakdown = chain.explain(&[0.0, 0.0], 3.0, &names()).unwrap();
        assert_eq!(breakdown.method(), AttributionMethod::CoalitionEnumeration);
        assert!(breakdown.used_fallback());
    }

    #[test]
    fn test_fallback_on_local_accuracy_violation() {
        let chain = AttributionChain::new(
            fixed(AttributionMethod::TreeShap, Ok(vec![5.0, 5.0])),
            fixed(AttributionMethod::CoalitionEnumeration, Ok(vec![1.0, 1.0])),
        );
        let breakdown = chain.explain(&[0.0, 0.0], 3.0, &names()).unwrap();
        assert!(breakdown.used_fallback());
        assert!(breakdown.check_local_accuracy(3.0).is_ok());
    }

    #[test]
    fn test_fallback_when_primary_unprepared() {
        let chain = AttributionChain::new(
            Err(ExplainError::MissingNodeStats("tree 0 has no node covers".to_string())),
            fixed(AttributionMethod::CoalitionEnumeration, Ok(vec![1.0, 1.0])),
        );
        assert!(!chain.primary_available());
        assert!(chain.fallback_available());
        assert!(chain.explain(&[0.0, 0.0], 3.0, &names()).unwrap().used_fallback());
    }

    #[test]
    fn test_both_fail() {
        let chain = AttributionChain::new(
            Err(ExplainError::MissingNodeStats("tree 0 has no node covers".to_string())),
            fixed(
                AttributionMethod::CoalitionEnumeration,
                Err(ExplainError::TooManyFeatures {
                    n_features: 20,
                    max: 16,
                }),
            ),
        );
        match chain.explain(&[0.0, 0.0], 3.0, &names()).unwrap_err() {
            ExplainError::Unavailable { primary, fallback } => {
                assert!(primary.contains("no node covers"));
                assert!(fallback.contains("enumeration limit"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
