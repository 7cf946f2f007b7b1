//! Text to TF-IDF feature mapping.
//!
//! A [`Vocabulary`] is learned once per training run by [`Vectorizer::fit`]
//! and is never patched afterwards; [`Vectorizer::transform`] maps any text
//! onto it, dropping out-of-vocabulary tokens.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;
use stop_words::LANGUAGE;
use tracing::debug;

use crate::types::LabeledText;

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();

fn token_regex() -> &'static Regex {
    // constant pattern, covered by the tokenizer tests
    TOKEN_REGEX.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern"))
}

/// Term to (feature index, idf) mapping. Indices follow lexicographic term
/// order, so fitting the same corpus always yields the same layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabularyRepr", into = "VocabularyRepr")]
pub struct Vocabulary {
    terms: Vec<String>,
    idf: Vec<f64>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct VocabularyRepr {
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl From<VocabularyRepr> for Vocabulary {
    fn from(repr: VocabularyRepr) -> Self {
        Vocabulary::from_parts(repr.terms, repr.idf)
    }
}

impl From<Vocabulary> for VocabularyRepr {
    fn from(vocabulary: Vocabulary) -> Self {
        VocabularyRepr {
            terms: vocabulary.terms,
            idf: vocabulary.idf,
        }
    }
}

impl Vocabulary {
    fn from_parts(terms: Vec<String>, idf: Vec<f64>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Self { terms, idf, index }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn lookup(&self, term: &str) -> Option<(usize, f64)> {
        let &i = self.index.get(term)?;
        Some((i, *self.idf.get(i)?))
    }

    /// Reverse lookup used by attribution.
    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    pub fn idf(&self, index: usize) -> Option<f64> {
        self.idf.get(index).copied()
    }

    /// `false` when the term list and idf list disagree, e.g. a hand-edited artifact.
    pub fn is_consistent(&self) -> bool {
        self.terms.len() == self.idf.len() && self.index.len() == self.terms.len()
    }
}

/// Sparse weighted term frequencies for one document, sorted by index.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }
}

/// Lower-casing, stop-word filtering tokenizer shared by fit and transform.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn english() -> Self {
        let stop_words = stop_words::get(LANGUAGE::English)
            .iter()
            .map(|word| word.to_string())
            .collect();
        Self::with_stop_words(stop_words)
    }

    pub fn with_stop_words(stop_words: HashSet<String>) -> Self {
        Self { stop_words }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        token_regex()
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(*token))
            .map(str::to_string)
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::english()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Vectorizer {
    tokenizer: Tokenizer,
}

impl Vectorizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Learns terms and smoothed idf weights from the corpus.
    pub fn fit(&self, corpus: &[LabeledText]) -> Vocabulary {
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for sample in corpus {
            let unique: HashSet<String> = self.tokenizer.tokenize(&sample.text).into_iter().collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let n_docs = corpus.len() as f64;
        let (terms, idf): (Vec<String>, Vec<f64>) = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let idf = ((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0;
                (term, idf)
            })
            .unzip();

        debug!("Fitted vocabulary: {} terms from {} documents", terms.len(), corpus.len());
        Vocabulary::from_parts(terms, idf)
    }

    /// Maps text onto `vocabulary`: raw counts times idf, L2-normalised.
    pub fn transform(&self, text: &str, vocabulary: &Vocabulary) -> FeatureVector {
        let mut counts: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
        for token in self.tokenizer.tokenize(text) {
            if let Some((index, idf)) = vocabulary.lookup(&token) {
                counts.entry(index).or_insert((0.0, idf)).0 += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, (count, idf))| (index, count * idf))
            .collect();

        let norm = entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, value) in entries.iter_mut() {
                *value /= norm;
            }
        }

        FeatureVector {
            dim: vocabulary.len(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Label;

    fn vectorizer() -> Vectorizer {
        let stop_words = ["the", "a", "is", "at", "on"]
            .iter()
            .map(|w| w.to_string())
            .collect();
        Vectorizer::new(Tokenizer::with_stop_words(stop_words))
    }

    fn corpus() -> Vec<LabeledText> {
        vec![
            LabeledText::new("Free prize waiting", Label::Spam),
            LabeledText::new("Lunch at noon", Label::Ham),
            LabeledText::new("free lunch is the best lunch", Label::Ham),
        ]
    }

    #[test]
    fn test_token_regex_is_compiled_once() {
        assert!(std::ptr::eq(token_regex(), token_regex()));
        assert_eq!(token_regex().as_str(), TOKEN_PATTERN);
    }

    #[test]
    fn test_tokenize_lowercases_and_filters() {
        let v = vectorizer();
        let tokens = v.tokenizer().tokenize("The FREE prize, a x at 1pm!");
        assert_eq!(tokens, vec!["free", "prize", "1pm"]);
    }

    #[test]
    fn test_fit_orders_terms_and_smooths_idf() {
        let vocab = vectorizer().fit(&corpus());
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.term(0), Some("best"));
        assert_eq!(vocab.term(1), Some("free"));

        // "free" appears in 2 of 3 documents
        let (_, idf) = vocab.lookup("free").unwrap();
        assert!((idf - ((4.0f64 / 3.0).ln() + 1.0)).abs() < 1e-12);
        // "prize" appears once
        let (_, idf) = vocab.lookup("prize").unwrap();
        assert!((idf - (2.0f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_l2_normalised() {
        let v = vectorizer();
        let vocab = v.fit(&corpus());
        let fv = v.transform("free lunch lunch", &vocab);
        assert_eq!(fv.dim(), vocab.len());
        assert_eq!(fv.nnz(), 2);
        let norm: f64 = fv.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        let (lunch, _) = vocab.lookup("lunch").unwrap();
        let (free, _) = vocab.lookup("free").unwrap();
        assert!(fv.get(lunch) > fv.get(free));
    }

    #[test]
    fn test_out_of_vocabulary_is_dropped() {
        let v = vectorizer();
        let vocab = v.fit(&corpus());
        let fv = v.transform("completely unseen words", &vocab);
        assert!(fv.is_empty());
        assert_eq!(fv.dim(), vocab.len());
        assert_eq!(fv.get(0), 0.0);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let v = vectorizer();
        let vocab = v.fit(&corpus());
        let a = v.transform("free prize lunch", &vocab);
        let b = v.transform("free prize lunch", &vocab);
        assert_eq!(a, b);
    }

    #[test]
    fn test_vocabulary_serde_rebuilds_index() {
        let vocab = vectorizer().fit(&corpus());
        let json = serde_json::to_string(&vocab).unwrap();
        assert!(!json.contains("index"));
        let restored: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vocab);
        assert_eq!(restored.lookup("prize"), vocab.lookup("prize"));
        assert!(restored.is_consistent());
    }
}
