//! Inference and Attribution Service

use crate::config::ServiceConfig;
use crate::ServiceError;
use attribution::{AttributionBreakdown, AttributionChain, Attributor, TreeShap};
use fallback::CoalitionExplainer;
use feature_engine::{FeatureSchema, FeatureVector, FEATURE_DIMENSION};
use inference_engine::{load_model, InferenceEngine, LoadedModel, ModelInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Predicted ACL stress
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prediction {
    pub value: f64,
}

impl Prediction {
    /// Format with a fixed number of decimals
    pub fn format(&self, decimals: usize) -> String {
        format!("{:.*}", decimals, self.value)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.value)
    }
}

/// Prediction together with the outcome of explaining it
#[derive(Debug, Clone)]
pub struct Assessment {
    pub features: FeatureVector,
    pub prediction: Prediction,
    /// A failed explanation never hides the prediction
    pub explanation: Result<AttributionBreakdown, ServiceError>,
}

/// ACL stress prediction and attribution over one loaded model
pub struct StressService {
    engine: InferenceEngine,
    attribution: AttributionChain,
    schema: FeatureSchema,
}

impl StressService {
    /// Load the configured model and prepare both attribution methods
    pub fn load(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let schema = FeatureSchema::with_names(config.labels.clone(), config.short_names.clone())
            .map_err(|e| ServiceError::Config(format!("feature names: {e}")))?;
        let model = load_model(&config.model_path)?;
        Self::from_model(model, schema)
    }

    /// Build from an already loaded model
    pub fn from_model(model: LoadedModel, schema: FeatureSchema) -> Result<Self, ServiceError> {
        check_dimension(model.forest.n_features())?;
        let engine = InferenceEngine::new(model);
        let forest = engine.forest().clone();

        let primary = TreeShap::new(forest.clone()).map(|m| Box::new(m) as Box<dyn Attributor>);
        let fallback = CoalitionExplainer::new(forest).map(|m| Box::new(m) as Box<dyn Attributor>);

        Self::with_parts(engine, AttributionChain::new(primary, fallback), schema)
    }

    /// Assemble from parts
    pub fn with_parts(
        engine: InferenceEngine,
        attribution: AttributionChain,
        schema: FeatureSchema,
    ) -> Result<Self, ServiceError> {
        let forest = engine.forest();
        check_dimension(forest.n_features())?;

        let trained = forest.feature_names();
        if !trained.is_empty() && trained != FeatureSchema::default().short_names() {
            warn!(
                "Model was trained with feature names {:?}; inputs are passed in canonical order",
                trained
            );
        }

        info!(
            "Stress service ready: {} trees, primary attribution {}",
            engine.info().n_trees,
            if attribution.primary_available() {
                "available"
            } else {
                "unavailable"
            }
        );

        Ok(Self {
            engine,
            attribution,
            schema,
        })
    }

    /// Predict from raw values in canonical order
    pub fn predict(&self, features: &[f64]) -> Result<Prediction, ServiceError> {
        let vector = FeatureVector::from_slice(features)?;
        Ok(self.predict_vector(&vector))
    }

    /// Predict from a validated vector
    pub fn predict_vector(&self, features: &FeatureVector) -> Prediction {
        // Feature count was checked when the service was built
        let value = self.engine.forest().predict(features.values());
        debug!("Predicted {:.6} for {:?}", value, features.values());
        Prediction { value }
    }

    /// Explain the prediction for raw values in canonical order
    pub fn explain(&self, features: &[f64]) -> Result<AttributionBreakdown, ServiceError> {
        let vector = FeatureVector::from_slice(features)?;
        self.explain_vector(&vector)
    }

    /// Explain the prediction for a validated vector
    pub fn explain_vector(&self, features: &FeatureVector) -> Result<AttributionBreakdown, ServiceError> {
        let prediction = self.predict_vector(features);
        let breakdown = self.attribution.explain(
            features.values(),
            prediction.value,
            self.schema.short_names(),
        )?;
        Ok(breakdown)
    }

    /// Predict and explain in one call
    pub fn assess(&self, features: &FeatureVector) -> Assessment {
        let prediction = self.predict_vector(features);
        let explanation = self
            .attribution
            .explain(features.values(), prediction.value, self.schema.short_names())
            .map_err(ServiceError::from);

        if let Err(e) = &explanation {
            warn!("Prediction {} returned without explanation: {}", prediction, e);
        }

        Assessment {
            features: *features,
            prediction,
            explanation,
        }
    }

    /// Metadata of the loaded model
    pub fn model_info(&self) -> &ModelInfo {
        self.engine.info()
    }

    /// Display names
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Whether TreeSHAP could be prepared for this model
    pub fn primary_attribution_available(&self) -> bool {
        self.attribution.primary_available()
    }
}

fn check_dimension(n_features: usize) -> Result<(), ServiceError> {
    if n_features != FEATURE_DIMENSION {
        return Err(ServiceError::ModelLoad(format!(
            "model expects {} features, the service provides {}",
            n_features, FEATURE_DIMENSION
        )));
    }
    Ok(())
}
