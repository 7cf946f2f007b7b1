use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Settings,
    engine::{ModelHandle, Pipeline},
    error::EngineError,
    storage::FeedbackLog,
    telemetry,
    types::{
        FeedbackRequest, FeedbackResponse, HistoryEntry, Label, ModelResponse, PredictRequest,
        PredictResponse, PredictionResult, StatsResponse,
    },
};

const HISTORY_LEN: usize = 5;

/// Per-process counters and the most recent predictions, newest first.
#[derive(Debug, Default)]
pub struct Session {
    checked: u64,
    spam: u64,
    ham: u64,
    history: VecDeque<HistoryEntry>,
}

impl Session {
    pub fn record(&mut self, text: &str, result: &PredictionResult) {
        self.checked += 1;
        match result.label {
            Label::Spam => self.spam += 1,
            Label::Ham => self.ham += 1,
        }
        self.history.push_front(HistoryEntry {
            text: text.to_string(),
            label: result.label.as_str().to_string(),
            probability: result.probability,
            time: chrono::Utc::now(),
        });
        self.history.truncate(HISTORY_LEN);
    }

    pub fn snapshot(&self) -> StatsResponse {
        StatsResponse {
            checked: self.checked,
            spam: self.spam,
            ham: self.ham,
            history: self.history.iter().cloned().collect(),
        }
    }
}

pub struct AppState {
    pub model: ModelHandle,
    pub pipeline: Pipeline,
    pub feedback: FeedbackLog,
    pub settings: Settings,
    pub session: Mutex<Session>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings, model: ModelHandle, prometheus: Option<PrometheusHandle>) -> Self {
        Self {
            pipeline: Pipeline::from_settings(&settings),
            feedback: FeedbackLog::new(settings.feedback.path.clone()),
            model,
            settings,
            session: Mutex::new(Session::default()),
            prometheus,
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/feedback", post(feedback_handler))
        .route("/stats", get(stats_handler))
        .route("/model", get(model_handler))
        .route("/reload", post(reload_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn predict_handler(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, EngineError> {
    let Json(request) = payload?;
    let start = Instant::now();
    let threshold = request.threshold.unwrap_or(state.settings.model.threshold);

    let model = state.model.current();
    let result = state.pipeline.classify(&model, &request.text, threshold)?;

    state.session.lock().record(&request.text, &result);
    telemetry::observe_prediction(&result, start.elapsed());

    Ok(Json(result.into()))
}

async fn feedback_handler(
    State(state): State<SharedState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, EngineError> {
    let Json(request) = payload?;
    let record = tokio::task::spawn_blocking({
        let state = Arc::clone(&state);
        move || state.feedback.record_feedback(&request.text, request.label)
    })
    .await??;
    telemetry::observe_feedback(record.label);

    Ok(Json(FeedbackResponse {
        success: true,
        message: "Feedback recorded".to_string(),
    }))
}

async fn stats_handler(State(state): State<SharedState>) -> Json<StatsResponse> {
    Json(state.session.lock().snapshot())
}

async fn model_handler(State(state): State<SharedState>) -> Json<ModelResponse> {
    Json(model_response(&state.model))
}

async fn reload_handler(
    State(state): State<SharedState>,
) -> Result<Json<ModelResponse>, EngineError> {
    let result = tokio::task::spawn_blocking({
        let state = Arc::clone(&state);
        move || state.model.reload(&state.settings.model.path)
    })
    .await?;
    telemetry::observe_reload(result.is_ok());
    result?;
    info!("Model reloaded from {}", state.settings.model.path.display());
    Ok(Json(model_response(&state.model)))
}

async fn metrics_handler(State(state): State<SharedState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn health_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": state.model.current().info().version,
    }))
}

fn model_response(handle: &ModelHandle) -> ModelResponse {
    let model = handle.current();
    ModelResponse {
        version: model.info().version.clone(),
        trained_at: model.info().trained_at,
        training_samples: model.info().training_samples,
        vocabulary_size: model.vocabulary().len(),
    }
}
