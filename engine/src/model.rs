use chrono::{DateTime, Utc};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::features::{FeatureVector, Vectorizer, Vocabulary};
use crate::types::Label;

pub const DEFAULT_THRESHOLD: f64 = 0.50;

const LOG_ODDS_CLAMP: f64 = 1e-4;

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Spam iff `probability >= threshold`; a tie goes to spam.
pub fn predict(probability: f64, threshold: f64) -> Label {
    if probability >= threshold {
        Label::Spam
    } else {
        Label::Ham
    }
}

/// Inverts the sigmoid after clamping `p` away from 0 and 1.
pub fn log_odds(probability: f64) -> f64 {
    let p = probability.clamp(LOG_ODDS_CLAMP, 1.0 - LOG_ODDS_CLAMP);
    (p / (1.0 - p)).ln()
}

/// Weight vector plus bias, one weight per vocabulary term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierModel {
    weights: DVector<f64>,
    bias: f64,
}

impl ClassifierModel {
    pub fn new(weights: DVector<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn dim(&self) -> usize {
        self.weights.len()
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn feature_weights(&self) -> &[f64] {
        self.weights.as_slice()
    }

    /// `z = bias + sum(weight[i] * x[i])` over the indices present in `features`.
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        let mut z = self.bias;
        for (index, value) in features.iter() {
            z += self.weights.get(index).copied().unwrap_or(0.0) * value;
        }
        z
    }

    pub fn score(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.decision_function(features))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
}

impl ModelInfo {
    pub fn new(training_samples: usize) -> Self {
        let trained_at = Utc::now();
        Self {
            version: format!("v{}", trained_at.format("%Y%m%d%H%M%S")),
            trained_at,
            training_samples,
        }
    }
}

/// A vocabulary and the classifier trained against it. The two only ever
/// travel together; construction rejects a dimension mismatch.
#[derive(Debug, Clone)]
pub struct SpamModel {
    info: ModelInfo,
    vocabulary: Vocabulary,
    classifier: ClassifierModel,
    vectorizer: Vectorizer,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    #[serde(flatten)]
    info: &'a ModelInfo,
    vocabulary: &'a Vocabulary,
    classifier: &'a ClassifierModel,
}

#[derive(Deserialize)]
struct Artifact {
    #[serde(flatten)]
    info: ModelInfo,
    vocabulary: Vocabulary,
    classifier: ClassifierModel,
}

impl SpamModel {
    pub fn new(
        vocabulary: Vocabulary,
        classifier: ClassifierModel,
        info: ModelInfo,
    ) -> Result<Self, EngineError> {
        if vocabulary.len() != classifier.dim() {
            return Err(EngineError::DimensionMismatch {
                vocabulary: vocabulary.len(),
                weights: classifier.dim(),
            });
        }
        Ok(Self {
            info,
            vocabulary,
            classifier,
            vectorizer: Vectorizer::default(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::ModelLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact: Artifact = serde_json::from_str(&content).map_err(|e| {
            EngineError::ModelLoad(format!("cannot parse {}: {}", path.display(), e))
        })?;
        if !artifact.vocabulary.is_consistent() {
            return Err(EngineError::ModelLoad(format!(
                "{} has an inconsistent vocabulary",
                path.display()
            )));
        }
        let model = Self::new(artifact.vocabulary, artifact.classifier, artifact.info)
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        info!(
            "Loaded model from {}: version {}, {} terms, {} samples",
            path.display(),
            model.info.version,
            model.vocabulary.len(),
            model.info.training_samples
        );
        Ok(model)
    }

    /// Writes the artifact next to `path` and renames it into place, so a
    /// reader never sees a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let artifact = ArtifactRef {
            info: &self.info,
            vocabulary: &self.vocabulary,
            classifier: &self.classifier,
        };
        let content = serde_json::to_string(&artifact)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;

        debug!(
            "Saved model to {}: version {}, {} samples",
            path.display(),
            self.info.version,
            self.info.training_samples
        );
        Ok(())
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn classifier(&self) -> &ClassifierModel {
        &self.classifier
    }

    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    pub fn features(&self, text: &str) -> FeatureVector {
        self.vectorizer.transform(text, &self.vocabulary)
    }
}
