//! Frequency-based approximations of information content
//!
//! Neither estimator here looks at token order: they compute statistics of
//! the static character/word distribution of a single text. They are cheap
//! stand-ins for the model estimator when no weights are available.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::EstimateError;
use crate::estimator::{EntropyEstimate, TextEstimator};

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

/// Punctuation stripped from word edges before counting frequencies
const EDGE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"'];

/// Shannon entropy (bits) of a frequency table with `total` observations
pub fn shannon_entropy<'a, I>(counts: I, total: usize) -> f64
where
    I: IntoIterator<Item = &'a usize>,
{
    if total == 0 {
        return 0.0;
    }
    counts
        .into_iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Character and word distribution statistics of one text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShannonAnalysis {
    /// Entropy of the lowercased character distribution (bits/char)
    pub char_entropy: f64,
    /// Entropy of the lowercased word distribution (bits/word)
    pub word_entropy: f64,
    pub total_words: usize,
    pub unique_words: usize,
    pub avg_word_length: f64,
    /// `char_entropy * avg_word_length / total_words`
    pub estimated_bits_per_token: f64,
    /// `estimated_bits_per_token * total_words`
    pub total_estimated_bits: f64,
}

impl ShannonAnalysis {
    pub fn analyze(text: &str) -> Self {
        let lower = text.to_lowercase();

        let mut char_counts: HashMap<char, usize> = HashMap::new();
        for c in lower.chars() {
            *char_counts.entry(c).or_default() += 1;
        }
        let char_entropy = shannon_entropy(char_counts.values(), text.chars().count());

        let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();
        let mut word_counts: HashMap<&str, usize> = HashMap::new();
        for &word in &words {
            *word_counts.entry(word).or_default() += 1;
        }
        let total_words = words.len();
        let word_entropy = shannon_entropy(word_counts.values(), total_words);

        let denom = total_words.max(1) as f64;
        let avg_word_length = words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / denom;
        let estimated_bits_per_token = char_entropy * avg_word_length / denom;

        Self {
            char_entropy,
            word_entropy,
            total_words,
            unique_words: word_counts.len(),
            avg_word_length,
            estimated_bits_per_token,
            total_estimated_bits: estimated_bits_per_token * total_words as f64,
        }
    }

    /// Express the analysis in the common result shape, one "token" per word
    pub fn to_estimate(&self) -> EntropyEstimate {
        EntropyEstimate {
            total_bits: self.total_estimated_bits,
            avg_bits_per_token: self.estimated_bits_per_token,
            transitions: self.total_words,
        }
    }
}

/// Estimator backed by [`ShannonAnalysis`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ShannonEstimator;

impl TextEstimator for ShannonEstimator {
    fn method(&self) -> &'static str {
        "shannon"
    }

    fn estimate(&self, text: &str) -> Result<EntropyEstimate, EstimateError> {
        Ok(ShannonAnalysis::analyze(text).to_estimate())
    }
}

/// Word-frequency statistics with a concentration score
///
/// The score is `-Σ p^1.5` over normalized word frequencies: it is always
/// in `[-1, 0)` for non-empty text, approaching 0 as vocabulary grows more
/// diverse. It is not an entropy in bits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordFrequencyAnalysis {
    pub word_count: usize,
    pub sentence_count: usize,
    /// Distinct whitespace-separated words, compared verbatim
    pub unique_words: usize,
    pub entropy_score: f64,
}

impl WordFrequencyAnalysis {
    pub fn analyze(text: &str) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let sentence_count = SENTENCE_END
            .split(text)
            .filter(|s| !s.trim().is_empty())
            .count();

        if words.is_empty() {
            return Self {
                word_count: 0,
                sentence_count,
                unique_words: 0,
                entropy_score: 0.0,
            };
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for word in &words {
            let normalized = word.to_lowercase();
            let normalized = normalized.trim_matches(EDGE_PUNCTUATION);
            *freq.entry(normalized.to_string()).or_default() += 1;
        }

        let total = words.len() as f64;
        let entropy_score = freq
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                -p * p.sqrt()
            })
            .sum::<f64>();

        let unique_words = words
            .iter()
            .collect::<std::collections::HashSet<_>>()
            .len();

        Self {
            word_count: words.len(),
            sentence_count,
            unique_words,
            entropy_score,
        }
    }
}
