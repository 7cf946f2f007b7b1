use serde::Deserialize;
use std::path::PathBuf;

use crate::detectors::GibberishRules;
use crate::error::EngineError;

/// Process configuration.
///
/// Sources, later ones win: built-in defaults, an optional `logify.toml`
/// in the working directory, then `LOGIFY__<SECTION>__<KEY>` variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub feedback: FeedbackConfig,
    pub gibberish: GibberishRules,
    pub explain: ExplainConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model.json"),
            threshold: 0.50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub path: PathBuf,
    /// Collapse repeated feedback for the same text, newest label wins.
    pub dedupe: bool,
    /// Keep only the newest N feedback records when retraining.
    pub max_records: Option<usize>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("user_data.jsonl"),
            dedupe: true,
            max_records: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub top_terms: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self { top_terms: 6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub base_corpus: PathBuf,
    pub max_iterations: usize,
    pub learning_rate: f64,
    /// Inverse regularisation strength.
    pub c: f64,
    pub tolerance: f64,
    pub holdout_ratio: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            base_corpus: PathBuf::from("sms.tsv"),
            max_iterations: 2000,
            learning_rate: 2.0,
            c: 1.0,
            tolerance: 1e-6,
            holdout_ratio: 0.2,
            seed: 0,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, EngineError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("logify").required(false))
            .add_source(
                config::Environment::with_prefix("LOGIFY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
