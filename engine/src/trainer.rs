//! Offline rebuild of the vocabulary and classifier from base data plus feedback.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::features::Vectorizer;
use crate::logistic::{FitOutcome, LogisticRegression};
use crate::model::{predict, ModelInfo, SpamModel, DEFAULT_THRESHOLD};
use crate::types::{Label, LabeledText};

/// Reads a `label<TAB>text` corpus with `ham`/`spam` labels.
pub fn load_base_corpus(path: impl AsRef<Path>) -> Result<Vec<LabeledText>, EngineError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let corpus = parse_base_corpus(&content);
    info!("Loaded {} base samples from {}", corpus.len(), path.display());
    Ok(corpus)
}

pub fn parse_base_corpus(content: &str) -> Vec<LabeledText> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(line_no, line)| {
            let parsed = line.split_once('\t').and_then(|(label, text)| {
                let label = match label.trim() {
                    "ham" => Label::Ham,
                    "spam" => Label::Spam,
                    _ => return None,
                };
                Some(LabeledText::new(text, label))
            });
            if parsed.is_none() {
                warn!("Skipping malformed corpus row {}", line_no + 1);
            }
            parsed
        })
        .collect()
}

#[derive(Debug)]
pub struct TrainedModel {
    pub model: SpamModel,
    pub fit: FitOutcome,
}

pub struct Trainer {
    vectorizer: Vectorizer,
    optimizer: LogisticRegression,
}

impl Trainer {
    pub fn new(optimizer: LogisticRegression) -> Self {
        Self {
            vectorizer: Vectorizer::default(),
            optimizer,
        }
    }

    pub fn from_config(config: &TrainingConfig) -> Self {
        Self::new(LogisticRegression::from_config(config))
    }

    /// Fits a brand-new vocabulary and classifier on `base ++ feedback`.
    ///
    /// Nothing is shared with any previous model; the caller swaps the
    /// returned value in only once this returns `Ok`.
    pub fn retrain(
        &self,
        base: &[LabeledText],
        feedback: &[LabeledText],
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, EngineError> {
        let mut samples = Vec::with_capacity(base.len() + feedback.len());
        samples.extend_from_slice(base);
        samples.extend_from_slice(feedback);

        info!(
            "Retraining on {} samples ({} base, {} feedback)",
            samples.len(),
            base.len(),
            feedback.len()
        );
        self.fit(&samples, cancel)
    }

    pub fn fit(
        &self,
        samples: &[LabeledText],
        cancel: &CancellationToken,
    ) -> Result<TrainedModel, EngineError> {
        let spam = samples.iter().filter(|s| s.label.is_spam()).count();
        if spam == 0 || spam == samples.len() {
            return Err(EngineError::Training(format!(
                "training set needs both labels ({} spam of {})",
                spam,
                samples.len()
            )));
        }

        let vocabulary = self.vectorizer.fit(samples);
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let rows: Vec<_> = samples
            .iter()
            .map(|s| self.vectorizer.transform(&s.text, &vocabulary))
            .collect();
        let targets: Vec<f64> = samples.iter().map(|s| s.label.as_target()).collect();

        let fit = self.optimizer.fit(&rows, &targets, vocabulary.len(), cancel)?;
        let model = SpamModel::new(
            vocabulary,
            fit.classifier.clone(),
            ModelInfo::new(samples.len()),
        )?;

        info!(
            "Trained model {}: {} terms, {} iterations, loss {:.6}",
            model.info().version,
            model.vocabulary().len(),
            fit.iterations,
            fit.loss
        );
        Ok(TrainedModel { model, fit })
    }

    /// Trains a throw-away model on a seeded, stratified split and scores
    /// the held-out part.
    pub fn evaluate(
        &self,
        samples: &[LabeledText],
        holdout_ratio: f64,
        seed: u64,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport, EngineError> {
        let (train, test) = stratified_split(samples, holdout_ratio, seed);
        if test.is_empty() {
            return Err(EngineError::Training("holdout set is empty".to_string()));
        }
        let trained = self.fit(&train, cancel)?;

        let mut report = EvaluationReport::default();
        for sample in &test {
            let features = trained.model.features(&sample.text);
            let probability = trained.model.classifier().score(&features);
            report.observe(sample.label, predict(probability, DEFAULT_THRESHOLD));
        }
        Ok(report)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(LogisticRegression::default())
    }
}

/// Splits each label separately so both sides keep the class balance.
pub fn stratified_split(
    samples: &[LabeledText],
    holdout_ratio: f64,
    seed: u64,
) -> (Vec<LabeledText>, Vec<LabeledText>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let ratio = holdout_ratio.clamp(0.0, 1.0);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for label in [Label::Ham, Label::Spam] {
        let mut group: Vec<&LabeledText> = samples.iter().filter(|s| s.label == label).collect();
        group.shuffle(&mut rng);
        let n_test = (group.len() as f64 * ratio).round() as usize;
        let (held, kept) = group.split_at(n_test);
        test.extend(held.iter().map(|s| (*s).clone()));
        train.extend(kept.iter().map(|s| (*s).clone()));
    }
    (train, test)
}

/// Confusion counts with spam as the positive class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub true_spam: usize,
    pub false_spam: usize,
    pub true_ham: usize,
    pub false_ham: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl EvaluationReport {
    pub fn observe(&mut self, actual: Label, predicted: Label) {
        match (actual, predicted) {
            (Label::Spam, Label::Spam) => self.true_spam += 1,
            (Label::Ham, Label::Spam) => self.false_spam += 1,
            (Label::Ham, Label::Ham) => self.true_ham += 1,
            (Label::Spam, Label::Ham) => self.false_ham += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_spam + self.false_spam + self.true_ham + self.false_ham
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_spam + self.true_ham, self.total())
    }

    pub fn scores(&self, label: Label) -> ClassScores {
        let (tp, fp, fneg) = match label {
            Label::Spam => (self.true_spam, self.false_spam, self.false_ham),
            Label::Ham => (self.true_ham, self.false_ham, self.false_spam),
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fneg);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassScores {
            precision,
            recall,
            f1,
            support: tp + fneg,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<LabeledText> {
        let spam = [
            "WINNER claim your cash prize now",
            "URGENT cash reward waiting claim now",
            "Congratulations you won a prize txt CLAIM",
            "Free entry to win cash weekly prize",
        ];
        let ham = [
            "are we having dinner with mum tonight",
            "running late for the meeting sorry",
            "can you pick up milk on the way home",
            "lunch tomorrow sounds good",
            "ok see you at the station",
            "happy birthday hope you have a lovely day",
        ];
        spam.iter()
            .map(|t| LabeledText::new(*t, Label::Spam))
            .chain(ham.iter().map(|t| LabeledText::new(*t, Label::Ham)))
            .collect()
    }

    #[test]
    fn test_parse_base_corpus() {
        let parsed = parse_base_corpus("ham\tsee you soon\nspam\tWIN NOW\nbogus\tline\nno tab here\n\n");
        assert_eq!(
            parsed,
            vec![
                LabeledText::new("see you soon", Label::Ham),
                LabeledText::new("WIN NOW", Label::Spam),
            ]
        );
    }

    #[test]
    fn test_retrain_counts_base_plus_feedback() {
        let base = corpus();
        let feedback = vec![LabeledText::new("WIN FREE CASH NOW", Label::Spam)];
        let trained = Trainer::default()
            .retrain(&base, &feedback, &CancellationToken::new())
            .unwrap();
        assert_eq!(trained.model.info().training_samples, base.len() + 1);
        assert_eq!(trained.model.classifier().dim(), trained.model.vocabulary().len());
    }

    #[test]
    fn test_retrain_with_no_feedback() {
        let base = corpus();
        let trained = Trainer::default()
            .retrain(&base, &[], &CancellationToken::new())
            .unwrap();
        assert_eq!(trained.model.info().training_samples, base.len());
    }

    #[test]
    fn test_retrain_is_reproducible() {
        let base = corpus();
        let trainer = Trainer::default();
        let a = trainer.retrain(&base, &[], &CancellationToken::new()).unwrap();
        let b = trainer.retrain(&base, &[], &CancellationToken::new()).unwrap();
        assert_eq!(a.model.vocabulary(), b.model.vocabulary());
        assert_eq!(a.model.classifier(), b.model.classifier());
    }

    #[test]
    fn test_single_label_corpus_is_rejected() {
        let only_ham: Vec<LabeledText> = corpus()
            .into_iter()
            .filter(|s| s.label == Label::Ham)
            .collect();
        let err = Trainer::default()
            .retrain(&only_ham, &[], &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Training(_)));
    }

    #[test]
    fn test_cancel_aborts_retrain() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Trainer::default().retrain(&corpus(), &[], &cancel).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn test_stratified_split_is_seeded() {
        let samples = corpus();
        let (train_a, test_a) = stratified_split(&samples, 0.5, 7);
        let (train_b, test_b) = stratified_split(&samples, 0.5, 7);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len() + test_a.len(), samples.len());
        assert_eq!(test_a.iter().filter(|s| s.label.is_spam()).count(), 2);
        assert_eq!(test_a.iter().filter(|s| !s.label.is_spam()).count(), 3);
    }

    #[test]
    fn test_evaluation_report_scores() {
        let mut report = EvaluationReport::default();
        report.observe(Label::Spam, Label::Spam);
        report.observe(Label::Spam, Label::Ham);
        report.observe(Label::Ham, Label::Ham);
        report.observe(Label::Ham, Label::Ham);
        assert_eq!(report.total(), 4);
        assert!((report.accuracy() - 0.75).abs() < 1e-12);
        let spam = report.scores(Label::Spam);
        assert_eq!(spam.precision, 1.0);
        assert_eq!(spam.recall, 0.5);
        assert_eq!(spam.support, 2);
        let ham = report.scores(Label::Ham);
        assert!((ham.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(ham.recall, 1.0);
    }

    #[test]
    fn test_evaluate_runs_on_holdout() {
        let report = Trainer::default()
            .evaluate(&corpus(), 0.5, 0, &CancellationToken::new())
            .unwrap();
        assert_eq!(report.total(), 5);
    }
}
