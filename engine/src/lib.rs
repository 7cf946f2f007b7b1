//! Spam/ham classification for short text messages, with explanations and
//! a feedback-driven retraining loop.

pub mod config;
pub mod confidence;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod explain;
pub mod features;
pub mod logistic;
pub mod model;
pub mod routes;
pub mod storage;
pub mod telemetry;
pub mod trainer;
pub mod types;

pub use engine::{ModelHandle, Pipeline};
pub use error::{EngineError, Result};
pub use model::SpamModel;
pub use types::{Label, LabeledText, PredictionResult};
