//! ACL Stress Web Service
//!
//! Form page with explanation charts, JSON prediction API, health and
//! Prometheus metrics endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use stress_service::{Assessment, ModelInfo, StressService};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod render;
mod routes;
pub mod settings;

pub use routes::predictions::{ErrorResponse, ExplainResponse, PredictRequest, PredictResponse};
pub use settings::{PlotConfig, Settings};

/// Application state shared across handlers
pub struct AppState {
    /// Loaded model with both attribution methods
    pub service: StressService,
    /// Settings the server was started with
    pub settings: Settings,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: StressService, settings: Settings) -> Self {
        Self {
            service,
            settings,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub(crate) fn page_view<'a>(
        &'a self,
        inputs: Vec<String>,
        assessment: Option<&'a Assessment>,
        error: Option<String>,
    ) -> render::PageView<'a> {
        render::PageView {
            settings: &self.settings,
            schema: self.service.schema(),
            model: self.service.model_info(),
            version: &self.version,
            inputs,
            assessment,
            error,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub model: ModelInfo,
    pub attribution: AttributionHealth,
}

/// Attribution method readiness
#[derive(Debug, Serialize)]
pub struct AttributionHealth {
    /// TreeSHAP could be prepared for the model
    pub primary_available: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::page::show_form).post(routes::page::submit_form))
        .route("/api/v1/predict", post(routes::predictions::predict))
        .route("/api/v1/explain", post(routes::predictions::explain))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        model: state.service.model_info().clone(),
        attribution: AttributionHealth {
            primary_available: state.service.primary_attribution_available(),
        },
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Count one served assessment
pub(crate) fn record_assessment(assessment: &Assessment) {
    metrics::counter!("acl_predictions_total").increment(1);
    match &assessment.explanation {
        Ok(breakdown) => {
            metrics::counter!("acl_explanations_total", "method" => breakdown.method().as_str())
                .increment(1);
        }
        Err(_) => metrics::counter!("acl_explanation_failures_total").increment(1),
    }
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown log level {level:?}"))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Load the model and run the server until it stops.
///
/// A model that cannot be loaded aborts startup.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let service = StressService::load(&settings.service_config())?;

    let mut state = AppState::new(service, settings);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("Prometheus recorder not installed: {}", e),
    }

    let addr = state.settings.bind_addr.clone();
    let app = create_router(Arc::new(state));

    info!("Starting ACL stress server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
