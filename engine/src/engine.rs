use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    confidence::confidence_bucket,
    config::Settings,
    detectors::{GibberishDetector, GIBBERISH_PROBABILITY, GIBBERISH_REASON},
    error::{validation_error, EngineError},
    explain::{top_spam_terms, DEFAULT_TOP_TERMS},
    model::{log_odds, predict, SpamModel},
    types::{Label, PredictionResult},
};

/// Stateless inference steps around a model: gibberish gate, scoring,
/// bucketing and attribution.
#[derive(Debug, Clone)]
pub struct Pipeline {
    gibberish: GibberishDetector,
    top_terms: usize,
}

impl Pipeline {
    pub fn new(gibberish: GibberishDetector, top_terms: usize) -> Self {
        Self { gibberish, top_terms }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            GibberishDetector::new(settings.gibberish.clone()),
            settings.explain.top_terms,
        )
    }

    pub fn classify(
        &self,
        model: &SpamModel,
        text: &str,
        threshold: f64,
    ) -> Result<PredictionResult, EngineError> {
        if text.trim().is_empty() {
            return Err(validation_error("text cannot be empty"));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(validation_error("threshold must be between 0 and 1"));
        }

        // Hard gate: degenerate input never reaches the model
        if self.gibberish.is_gibberish(text) {
            debug!("Gibberish override triggered");
            return Ok(PredictionResult {
                label: Label::Spam,
                probability: GIBBERISH_PROBABILITY,
                confidence: confidence_bucket(Label::Spam, GIBBERISH_PROBABILITY),
                attributed_terms: Vec::new(),
                override_reason: Some(GIBBERISH_REASON.to_string()),
                log_odds: log_odds(GIBBERISH_PROBABILITY),
            });
        }

        let features = model.features(text);
        let probability = model.classifier().score(&features);
        let label = predict(probability, threshold);

        let attributed_terms = if label.is_spam() {
            top_spam_terms(model, &features, self.top_terms)
        } else {
            Vec::new()
        };

        Ok(PredictionResult {
            label,
            probability,
            confidence: confidence_bucket(label, probability),
            attributed_terms,
            override_reason: None,
            log_odds: log_odds(probability),
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(GibberishDetector::default(), DEFAULT_TOP_TERMS)
    }
}

/// Shared pointer to the live model.
///
/// Readers clone the `Arc` under a short read lock and score against that
/// snapshot; a swap replaces the pointer whole, so no reader ever sees a
/// vocabulary from one model paired with weights from another.
pub struct ModelHandle {
    current: RwLock<Arc<SpamModel>>,
}

impl ModelHandle {
    pub fn new(model: SpamModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    pub fn current(&self) -> Arc<SpamModel> {
        Arc::clone(&self.current.read())
    }

    /// Installs `model` and returns the one it replaced.
    pub fn swap(&self, model: SpamModel) -> Arc<SpamModel> {
        let next = Arc::new(model);
        let version = next.info().version.clone();
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!("Swapped live model {} for {}", previous.info().version, version);
        previous
    }

    /// Loads the artifact at `path` and swaps it in. On failure the
    /// previous model stays live.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<SpamModel>, EngineError> {
        match SpamModel::load(path.as_ref()) {
            Ok(model) => {
                self.swap(model);
                Ok(self.current())
            }
            Err(e) => {
                warn!("Reload failed, keeping model {}: {}", self.current().info().version, e);
                Err(e)
            }
        }
    }
}
