/*!
Offline retraining: rebuilds the vocabulary and classifier from the base
corpus plus every piece of user feedback, then writes a new artifact.

Usage:
  cargo run --bin train --release -- \
    --corpus sms.tsv \
    --feedback user_data.jsonl \
    --out model.json \
    --evaluate

Corpus format: one `ham|spam<TAB>text` row per line.
The running server picks the new artifact up on restart or `POST /reload`.
*/

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logify_engine::{
    config::Settings,
    storage::{compact_feedback, load_feedback},
    trainer::{load_base_corpus, Trainer},
    types::Label,
};

#[derive(Parser, Debug)]
#[command(about = "Retrain the spam classifier from the base corpus and feedback log")]
struct Args {
    /// base corpus TSV, defaults to `training.base_corpus`
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// feedback log, defaults to `feedback.path`
    #[arg(long)]
    feedback: Option<PathBuf>,
    /// artifact to write, defaults to `model.path`
    #[arg(long)]
    out: Option<PathBuf>,
    /// train a throw-away model on a stratified split and report holdout scores first
    #[arg(long)]
    evaluate: bool,
    /// seed for the holdout split
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logify_engine=info,train=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::load()?;

    let corpus_path = args.corpus.unwrap_or_else(|| settings.training.base_corpus.clone());
    let feedback_path = args.feedback.unwrap_or_else(|| settings.feedback.path.clone());
    let out_path = args.out.unwrap_or_else(|| settings.model.path.clone());
    let seed = args.seed.unwrap_or(settings.training.seed);

    let base = load_base_corpus(&corpus_path)?;
    let raw_feedback = load_feedback(&feedback_path)?;
    let raw_count = raw_feedback.len();
    let feedback = compact_feedback(
        raw_feedback,
        settings.feedback.dedupe,
        settings.feedback.max_records,
    );
    info!(
        "Using {} of {} feedback records from {}",
        feedback.len(),
        raw_count,
        feedback_path.display()
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, abandoning training");
                cancel.cancel();
            }
        }
    });

    let trainer = Trainer::from_config(&settings.training);
    let holdout_ratio = settings.training.holdout_ratio;
    let evaluate = args.evaluate;
    let interrupted = cancel.clone();

    let trained = tokio::task::spawn_blocking(move || {
        if evaluate {
            let mut combined = base.clone();
            combined.extend_from_slice(&feedback);
            let report = trainer.evaluate(&combined, holdout_ratio, seed, &cancel)?;
            info!(
                "Holdout accuracy {:.4} over {} samples",
                report.accuracy(),
                report.total()
            );
            for label in [Label::Ham, Label::Spam] {
                let scores = report.scores(label);
                info!(
                    "{:>8}: precision {:.4} recall {:.4} f1 {:.4} support {}",
                    label.as_str(), scores.precision, scores.recall, scores.f1, scores.support
                );
            }
        }
        trainer.retrain(&base, &feedback, &cancel)
    })
    .await??;

    if interrupted.is_cancelled() {
        anyhow::bail!("training interrupted, {} left untouched", out_path.display());
    }
    if !trained.fit.converged {
        warn!("Saving a model that did not fully converge");
    }
    trained.model.save(&out_path)?;
    info!(
        "Wrote model {} ({} samples, {} terms) to {}",
        trained.model.info().version,
        trained.model.info().training_samples,
        trained.model.vocabulary().len(),
        out_path.display()
    );

    Ok(())
}
