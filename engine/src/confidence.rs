use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "Very likely spam")]
    VeryLikelySpam,
    #[serde(rename = "Probably spam")]
    ProbablySpam,
    #[serde(rename = "Borderline")]
    Borderline,
    #[serde(rename = "Looks clean")]
    LooksClean,
    #[serde(rename = "Definitely clean")]
    DefinitelyClean,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::VeryLikelySpam => "Very likely spam",
            Confidence::ProbablySpam => "Probably spam",
            Confidence::Borderline => "Borderline",
            Confidence::LooksClean => "Looks clean",
            Confidence::DefinitelyClean => "Definitely clean",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a verdict and its spam probability to a qualitative tier.
///
/// Upper bounds are exclusive: a spam verdict at exactly 0.87 is
/// "Probably spam", at exactly 0.65 it is "Borderline".
pub fn confidence_bucket(label: Label, probability: f64) -> Confidence {
    match label {
        Label::Spam => {
            if probability > 0.87 {
                Confidence::VeryLikelySpam
            } else if probability > 0.65 {
                Confidence::ProbablySpam
            } else {
                Confidence::Borderline
            }
        }
        Label::Ham => {
            if probability < 0.15 {
                Confidence::DefinitelyClean
            } else if probability < 0.35 {
                Confidence::LooksClean
            } else {
                Confidence::Borderline
            }
        }
    }
}
