//! Prediction Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stress_service::{AttributionBreakdown, FeatureVector, ServiceError};
use thiserror::Error;

use crate::{record_assessment, AppState};

/// Request body for both endpoints
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Nine measurements in canonical order
    pub features: Vec<f64>,
}

/// Response for the predict endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
    /// Prediction with the configured number of decimals
    pub formatted: String,
}

/// Response for the explain endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub prediction: f64,
    pub formatted: String,
    pub explanation: Option<AttributionBreakdown>,
    pub explanation_error: Option<String>,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by the JSON routes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Service(e) = &self;
        let status = match e {
            ServiceError::InvalidInput(_) => {
                metrics::counter!("acl_invalid_requests_total").increment(1);
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::ExplanationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ModelLoad(_) | ServiceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Predict ACL stress
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let prediction = state.service.predict(&request.features)?;
    metrics::counter!("acl_predictions_total").increment(1);

    Ok(Json(PredictResponse {
        prediction: prediction.value,
        formatted: prediction.format(state.settings.decimals),
    }))
}

/// Predict and explain ACL stress.
///
/// An unavailable explanation is reported in `explanation_error` alongside
/// the prediction.
pub async fn explain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let vector = FeatureVector::from_slice(&request.features).map_err(ServiceError::from)?;
    let assessment = state.service.assess(&vector);
    record_assessment(&assessment);

    let (explanation, explanation_error) = match assessment.explanation {
        Ok(breakdown) => (Some(breakdown), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(Json(ExplainResponse {
        prediction: assessment.prediction.value,
        formatted: assessment.prediction.format(state.settings.decimals),
        explanation,
        explanation_error,
    }))
}
