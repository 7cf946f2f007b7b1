use serde::Deserialize;
use tracing::debug;

pub const GIBBERISH_REASON: &str = "Looks like random keyboard-smash (gibberish rule).";
pub const GIBBERISH_PROBABILITY: f64 = 0.99;

/// Heuristic constants for the keyboard-mash gate. None of these have a
/// derivation behind them; they are tunable through configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GibberishRules {
    /// Trimmed inputs shorter than this (in characters) never trigger.
    pub min_text_len: usize,
    /// Words with fewer letters than this are not judged.
    pub min_letters: usize,
    /// A judged word is gibberish when its vowel ratio is below this.
    pub max_vowel_ratio: f64,
    /// Fraction of all words that must be gibberish to trigger.
    pub min_word_fraction: f64,
}

impl Default for GibberishRules {
    fn default() -> Self {
        Self {
            min_text_len: 5,
            min_letters: 3,
            max_vowel_ratio: 0.20,
            min_word_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GibberishDetector {
    rules: GibberishRules,
}

impl GibberishDetector {
    pub fn new(rules: GibberishRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &GibberishRules {
        &self.rules
    }

    pub fn is_gibberish(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.rules.min_text_len {
            return false;
        }

        let words: Vec<&str> = trimmed.split_whitespace().collect();
        if words.is_empty() {
            return false;
        }

        let gibberish_words = words
            .iter()
            .filter(|word| self.is_gibberish_word(word))
            .count();

        // Skipped words still count toward the denominator.
        let triggered =
            gibberish_words as f64 >= words.len() as f64 * self.rules.min_word_fraction;
        if triggered {
            debug!(
                "Gibberish rule triggered: {}/{} words",
                gibberish_words,
                words.len()
            );
        }
        triggered
    }

    fn is_gibberish_word(&self, word: &str) -> bool {
        let letters: Vec<char> = word.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        if letters.len() < self.rules.min_letters {
            return false;
        }
        let vowels = letters
            .iter()
            .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
            .count();
        let vowel_ratio = vowels as f64 / letters.len() as f64;
        vowel_ratio < self.rules.max_vowel_ratio
    }
}

impl Default for GibberishDetector {
    fn default() -> Self {
        Self::new(GibberishRules::default())
    }
}
