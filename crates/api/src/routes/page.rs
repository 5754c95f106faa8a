//! Form Page Routes

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use std::collections::HashMap;
use std::sync::Arc;
use stress_service::{Feature, FeatureVector};
use tracing::debug;

use crate::render::{default_inputs, page, PageView};
use crate::{record_assessment, AppState};

/// Render the empty form
pub async fn show_form(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(page(&state.page_view(default_inputs(), None, None)))
}

/// Predict and explain the submitted measurements
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let inputs: Vec<String> = Feature::ALL
        .iter()
        .map(|f| fields.get(f.key()).cloned().unwrap_or_default())
        .collect();

    let vector = FeatureVector::parse_fields(|f| fields.get(f.key()).map(String::as_str));
    match vector {
        Ok(vector) => {
            let assessment = state.service.assess(&vector);
            record_assessment(&assessment);
            debug!("Form prediction {}", assessment.prediction);
            let html = page(&state.page_view(inputs, Some(&assessment), None));
            (StatusCode::OK, Html(html))
        }
        Err(e) => {
            metrics::counter!("acl_invalid_requests_total").increment(1);
            debug!("Rejected form: {}", e);
            let html = page(&state.page_view(inputs, None, Some(e.to_string())));
            (StatusCode::UNPROCESSABLE_ENTITY, Html(html))
        }
    }
}
