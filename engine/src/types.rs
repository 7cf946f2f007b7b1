use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::confidence::Confidence;
use crate::error::EngineError;

/// Binary verdict. Serialized as `0` (ham) or `1` (spam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }

    pub fn as_target(self) -> f64 {
        f64::from(self.as_u8())
    }

    pub fn is_spam(self) -> bool {
        self == Label::Spam
    }

    /// Wire name used by the JSON API.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Ham => "NOT_SPAM",
            Label::Spam => "SPAM",
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Ham),
            1 => Ok(Label::Spam),
            other => Err(EngineError::Validation(format!(
                "label must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledText {
    pub text: String,
    pub label: Label,
}

impl LabeledText {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// A line of the feedback log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub text: String,
    pub label: Label,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    pub probability: f64,
    pub confidence: Confidence,
    pub attributed_terms: Vec<String>,
    pub override_reason: Option<String>,
    /// Clamped log-odds of `probability`, for placing the message on the sigmoid curve.
    pub log_odds: f64,
}

// API types

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    /// Missing text is treated as empty and rejected by validation.
    #[serde(default)]
    pub text: String,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: String,
    pub spam_probability: f64,
    pub confidence: Confidence,
    pub spam_words: Vec<String>,
    pub reason: Option<String>,
    pub log_odds: f64,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            label: result.label.as_str().to_string(),
            spam_probability: result.probability,
            confidence: result.confidence,
            spam_words: result.attributed_terms,
            reason: result.override_reason,
            log_odds: result.log_odds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub text: String,
    pub label: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub label: String,
    pub probability: f64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub checked: u64,
    pub spam: u64,
    pub ham: u64,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub vocabulary_size: usize,
}
