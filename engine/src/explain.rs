use thiserror::Error;
use tracing::debug;

use crate::features::FeatureVector;
use crate::model::SpamModel;

pub const DEFAULT_TOP_TERMS: usize = 6;

/// Read-only view of a trained model needed to explain a score.
pub trait FeatureAttribution {
    fn feature_weights(&self) -> &[f64];
    fn vocabulary_term(&self, index: usize) -> Option<&str>;
}

impl FeatureAttribution for SpamModel {
    fn feature_weights(&self) -> &[f64] {
        self.classifier().feature_weights()
    }

    fn vocabulary_term(&self, index: usize) -> Option<&str> {
        self.vocabulary().term(index)
    }
}

#[derive(Error, Debug)]
enum AttributionFailure {
    #[error("no weight for feature index {0}")]
    MissingWeight(usize),
    #[error("no vocabulary term for feature index {0}")]
    MissingTerm(usize),
}

/// Terms that pushed the score toward spam, strongest first.
///
/// Best effort: any inconsistency between the features and the model
/// yields an empty list rather than an error.
pub fn top_spam_terms<M>(model: &M, features: &FeatureVector, top_n: usize) -> Vec<String>
where
    M: FeatureAttribution + ?Sized,
{
    match rank_contributions(model, features, top_n) {
        Ok(terms) => terms,
        Err(e) => {
            debug!("Attribution skipped: {}", e);
            Vec::new()
        }
    }
}

fn rank_contributions<M>(
    model: &M,
    features: &FeatureVector,
    top_n: usize,
) -> Result<Vec<String>, AttributionFailure>
where
    M: FeatureAttribution + ?Sized,
{
    let weights = model.feature_weights();
    let mut scored = Vec::with_capacity(features.nnz());
    for (index, value) in features.iter().filter(|&(_, v)| v != 0.0) {
        let weight = weights
            .get(index)
            .ok_or(AttributionFailure::MissingWeight(index))?;
        scored.push((index, value * weight));
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .take(top_n)
        .filter(|&(_, contribution)| contribution > 0.0)
        .map(|(index, _)| {
            model
                .vocabulary_term(index)
                .map(str::to_string)
                .ok_or(AttributionFailure::MissingTerm(index))
        })
        .collect()
}
