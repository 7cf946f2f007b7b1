use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::warn;

use crate::types::{Label, PredictionResult};

/// Installs the global Prometheus recorder. Returns `None` when a recorder
/// is already installed, e.g. a second router in the same test process.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder not installed: {}", e);
            None
        }
    }
}

pub fn observe_prediction(result: &PredictionResult, elapsed: Duration) {
    let label = match result.label {
        Label::Spam => "spam",
        Label::Ham => "ham",
    };
    metrics::counter!("predictions_total", "label" => label).increment(1);
    if result.override_reason.is_some() {
        metrics::counter!("overrides_total").increment(1);
    }
    metrics::histogram!("prediction_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

pub fn observe_feedback(label: Label) {
    let label = match label {
        Label::Spam => "spam",
        Label::Ham => "ham",
    };
    metrics::counter!("feedback_total", "label" => label).increment(1);
}

pub fn observe_reload(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!("model_reloads_total", "outcome" => outcome).increment(1);
}
