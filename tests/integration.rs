//! Integration tests for surprisal-rs
//!
//! The estimator is exercised with deterministic stub tokenizers and
//! oracles. Tests marked with #[ignore] download a real model.
//! Run them explicitly with: cargo test --ignored
//!
//! Without the CUDA toolkit: cargo test --no-default-features

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use surprisal_rs::{
    EntropyEstimate, EstimateError, NextTokenOracle, OverflowPolicy, Report, SurprisalEstimator,
    TokenizationError, TokenizerAdapter,
};

/// Fixed text → token table, decoding to `T<i>`
struct Lookup {
    table: HashMap<&'static str, Vec<u32>>,
}

impl Lookup {
    fn new(entries: Vec<(&'static str, Vec<u32>)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }
}

impl TokenizerAdapter for Lookup {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| TokenizationError(format!("unknown text {text:?}")))
    }

    fn decode(&self, token_id: u32) -> String {
        format!("T{token_id}")
    }
}

/// Probability indexed by the position being scored; counts its calls
struct ByPosition {
    probs: Vec<f64>,
    calls: Cell<usize>,
    prefixes: RefCell<Vec<Vec<u32>>>,
}

impl ByPosition {
    fn new(probs: &[f64]) -> Self {
        Self {
            probs: probs.to_vec(),
            calls: Cell::new(0),
            prefixes: RefCell::new(Vec::new()),
        }
    }
}

impl NextTokenOracle for ByPosition {
    fn probability_of(&self, _token_id: u32, prefix: &[u32]) -> anyhow::Result<f64> {
        self.calls.set(self.calls.get() + 1);
        self.prefixes.borrow_mut().push(prefix.to_vec());
        Ok(self.probs[prefix.len()])
    }
}

fn sentence() -> Lookup {
    Lookup::new(vec![
        ("", vec![]),
        ("<bos>", vec![50256]),
        ("The cat", vec![0, 1]),
        ("The cat sat", vec![0, 1, 2]),
        ("The cat sat.", vec![0, 1, 2, 3, 4]),
    ])
}

#[test]
fn test_end_to_end_known_bits() {
    let oracle = ByPosition::new(&[f64::NAN, 0.5, 0.25, 0.5, 0.5]);
    let estimator = SurprisalEstimator::new(sentence(), &oracle);

    let result = estimator.estimate("The cat sat.").unwrap();
    assert_eq!(result.total_bits, 5.0);
    assert_eq!(result.avg_bits_per_token, 1.25);
    assert_eq!(result.transitions, 4);
    assert_eq!(oracle.calls.get(), 4);

    // Prefixes are the growing slices of the sequence
    assert_eq!(
        *oracle.prefixes.borrow(),
        vec![vec![0], vec![0, 1], vec![0, 1, 2], vec![0, 1, 2, 3]]
    );
}

#[test]
fn test_empty_and_single_token_skip_oracle() {
    let oracle = ByPosition::new(&[]);
    let estimator = SurprisalEstimator::new(sentence(), &oracle);

    assert_eq!(estimator.estimate("").unwrap(), EntropyEstimate::ZERO);
    assert_eq!(estimator.estimate("<bos>").unwrap(), EntropyEstimate::ZERO);
    assert_eq!(oracle.calls.get(), 0);
}

#[test]
fn test_two_tokens_query_once() {
    let oracle = ByPosition::new(&[0.0, 0.125]);
    let estimator = SurprisalEstimator::new(sentence(), &oracle);

    let result = estimator.estimate("The cat").unwrap();
    assert_eq!(oracle.calls.get(), 1);
    assert_eq!(result.total_bits, 3.0);
    assert_eq!(result.avg_bits_per_token, 3.0);
}

#[test]
fn test_zero_probability_reports_token_and_position() {
    let oracle = ByPosition::new(&[0.0, 0.5, 0.0]);
    let estimator = SurprisalEstimator::new(sentence(), &oracle);

    let err = estimator.estimate("The cat sat").unwrap_err();
    match &err {
        EstimateError::InvalidProbability {
            position, token, ..
        } => {
            assert_eq!(*position, 2);
            assert_eq!(token, "T2");
        }
        other => panic!("expected InvalidProbability, got {other:?}"),
    }
    assert!(err.to_string().contains("\"T2\""));
}

#[test]
fn test_tokenization_failure_propagates() {
    let oracle = ByPosition::new(&[]);
    let estimator = SurprisalEstimator::new(sentence(), &oracle);

    let err = estimator.estimate("never seen").unwrap_err();
    assert!(matches!(err, EstimateError::Tokenization(_)));
    assert_eq!(oracle.calls.get(), 0);
}

#[test]
fn test_aggregation_law_and_non_negativity() {
    let probs = [0.0, 0.9, 0.013, 0.31, 1.0];
    let estimator = SurprisalEstimator::new(sentence(), ByPosition::new(&probs));
    let result = estimator.estimate("The cat sat.").unwrap();

    assert!(result.total_bits >= 0.0);
    let recomposed = result.avg_bits_per_token * result.transitions as f64;
    assert!((recomposed - result.total_bits).abs() < 1e-12);
}

#[test]
fn test_more_confident_oracle_scores_fewer_bits() {
    let weak = SurprisalEstimator::new(sentence(), ByPosition::new(&[0.0, 0.2, 0.1, 0.3, 0.05]));
    let strong = SurprisalEstimator::new(sentence(), ByPosition::new(&[0.0, 0.4, 0.1, 0.9, 0.5]));

    let weak_bits = weak.estimate("The cat sat.").unwrap().total_bits;
    let strong_bits = strong.estimate("The cat sat.").unwrap().total_bits;
    assert!(strong_bits <= weak_bits);
}

#[test]
fn test_repeated_estimates_are_identical() {
    let estimator = SurprisalEstimator::new(sentence(), ByPosition::new(&[0.0, 0.3, 0.7, 0.11, 0.42]));
    let first = estimator.estimate("The cat sat.").unwrap();
    let second = estimator.estimate("The cat sat.").unwrap();
    assert_eq!(first.total_bits.to_bits(), second.total_bits.to_bits());
    assert_eq!(
        first.avg_bits_per_token.to_bits(),
        second.avg_bits_per_token.to_bits()
    );
}

#[test]
fn test_overflow_policies() {
    let probs = [0.0, 1.0 + 1e-7, 0.5];

    let clamped = SurprisalEstimator::new(sentence(), ByPosition::new(&probs));
    assert_eq!(clamped.estimate("The cat sat").unwrap().total_bits, 1.0);

    let strict = SurprisalEstimator::new(sentence(), ByPosition::new(&probs))
        .with_overflow_policy(OverflowPolicy::Reject);
    let err = strict.estimate("The cat sat").unwrap_err();
    assert!(matches!(
        err,
        EstimateError::ProbabilityAboveOne { position: 1, .. }
    ));
}

#[test]
fn test_report_from_estimate() {
    let estimator = SurprisalEstimator::new(sentence(), ByPosition::new(&[0.0, 0.5, 0.25, 0.5, 0.5]));
    let estimate = estimator.estimate("The cat sat.").unwrap();
    let text = Report::new("The cat sat.", "model", estimate).render_text();

    assert_eq!(
        text.lines().collect::<Vec<_>>(),
        vec![
            "The cat sat.",
            "Character count: 12",
            "Total tokens: 4",
            "Total bits: 5.00",
            "Bits per token: 1.25",
        ]
    );
}

/// Real model: GPT-2 scores an ordinary sentence
#[test]
#[ignore = "requires model download"]
fn test_gpt2_sentence() {
    use surprisal_rs::SurprisalModel;

    let model = SurprisalModel::from_pretrained_with_device("openai-community/gpt2", true).unwrap();
    assert_eq!(model.vocab_size(), 50257);

    let estimator = SurprisalEstimator::new(&model, &model);
    let text = "The quick brown fox jumps over the lazy dog.";
    let tokens = model.encode(text).unwrap();
    let result = estimator.estimate(text).unwrap();

    assert_eq!(result.transitions, tokens.len() - 1);
    assert!(result.total_bits > 0.0);
    assert!(result.avg_bits_per_token > 0.0 && result.avg_bits_per_token < 20.0);
}

/// Real model: probabilities over the vocabulary sum to one
#[test]
#[ignore = "requires model download"]
fn test_gpt2_distribution_normalized() {
    use surprisal_rs::SurprisalModel;

    let model = SurprisalModel::from_pretrained_with_device("openai-community/gpt2", true).unwrap();
    let prefix = model.encode("Hello").unwrap();
    let log_probs = model.next_token_log_probs(&prefix).unwrap();
    let total: f32 = log_probs.exp().unwrap().sum_all().unwrap().to_scalar().unwrap();
    assert!((total - 1.0).abs() < 1e-3);
}
