//! Append-only feedback log.
//!
//! One JSON object per line: `{"text": ..., "label": 0|1, "ts": ...}`.
//! Lines are written with a single `write_all` on a handle opened in append
//! mode, so concurrent writers never interleave inside a line.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{validation_error, EngineError};
use crate::types::{FeedbackRecord, Label, LabeledText};

pub struct FeedbackLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validates and appends one record.
    pub fn record_feedback(&self, text: &str, label: u8) -> Result<FeedbackRecord, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(validation_error("feedback text cannot be empty"));
        }
        let label = Label::try_from(label)?;

        let record = FeedbackRecord {
            text: text.to_string(),
            label,
            ts: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        {
            let _guard = self.writer.lock();
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())?;
        }

        debug!("Recorded feedback ({}) to {}", label, self.path.display());
        Ok(record)
    }

    /// All valid records in file order. A missing log is an empty log.
    pub fn load_feedback(&self) -> Result<Vec<LabeledText>, EngineError> {
        load_feedback(&self.path)
    }
}

/// Reads every valid `(text, label)` pair from the log at `path`.
///
/// Lines that are not UTF-8 JSON objects, whose label is not exactly the
/// integer 0 or 1, or whose text is empty after trimming are logged and
/// skipped. Only a failure to read the file itself is an error.
pub fn load_feedback(path: impl AsRef<Path>) -> Result<Vec<LabeledText>, EngineError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No feedback log at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for (line_no, raw) in BufReader::new(file).split(b'\n').enumerate() {
        let raw = raw?;
        let Ok(line) = std::str::from_utf8(&raw) else {
            skipped += 1;
            warn!("Skipping undecodable feedback line {} in {}", line_no + 1, path.display());
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(sample) => samples.push(sample),
            None => {
                skipped += 1;
                warn!("Skipping corrupt feedback line {} in {}", line_no + 1, path.display());
            }
        }
    }

    debug!(
        "Loaded {} feedback records from {} ({} skipped)",
        samples.len(),
        path.display(),
        skipped
    );
    Ok(samples)
}

fn parse_line(line: &str) -> Option<LabeledText> {
    let row: Value = serde_json::from_str(line).ok()?;
    let text = row.get("text")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    let label = match row.get("label")?.as_u64()? {
        0 => Label::Ham,
        1 => Label::Spam,
        _ => return None,
    };
    Some(LabeledText::new(text, label))
}

/// Applies the growth policy to feedback before retraining.
///
/// With `dedupe`, repeated texts collapse to one sample carrying the newest
/// label, positioned where that newest record appeared. With `max_records`,
/// only the newest N samples survive.
pub fn compact_feedback(
    feedback: Vec<LabeledText>,
    dedupe: bool,
    max_records: Option<usize>,
) -> Vec<LabeledText> {
    let mut samples = if dedupe {
        let mut seen = std::collections::HashSet::new();
        let mut newest_first: Vec<LabeledText> = feedback
            .into_iter()
            .rev()
            .filter(|sample| seen.insert(sample.text.clone()))
            .collect();
        newest_first.reverse();
        newest_first
    } else {
        feedback
    };

    if let Some(cap) = max_records {
        if samples.len() > cap {
            let excess = samples.len() - cap;
            samples.drain(..excess);
        }
    }
    samples
}
