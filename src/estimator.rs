//! Surprisal Estimator: bits of information carried by each token
//!
//! For a token sequence `t[0..L)` the estimator asks the oracle for
//! `p_i = P(t[i] | t[0..i))` at every position `i >= 1` and sums
//! `-log2(p_i)`. The first token has no context and is never scored, so
//! exactly `L - 1` oracle calls are made and texts with `L <= 1` score
//! `(0.0, 0.0)`.
//!
//! ## Probability policy
//!
//! - `p <= 0` or NaN: always an [`EstimateError::InvalidProbability`].
//! - `p > 1`: handled by [`OverflowPolicy`]. The default clamps to 1.0
//!   (zero bits); `Reject` fails with [`EstimateError::ProbabilityAboveOne`].

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;
use crate::oracle::NextTokenOracle;
use crate::tokenizer::{format_token, TokenizerAdapter};

/// What to do when the oracle reports a probability above 1.0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Treat the value as exactly 1.0 (contributes zero bits)
    #[default]
    Clamp,
    /// Fail the evaluation
    Reject,
}

/// Aggregate information content of one text
///
/// Shared by the model-based estimator and the frequency heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropyEstimate {
    /// Sum of surprisal over all scored positions (bits)
    pub total_bits: f64,
    /// `total_bits / transitions`, or 0.0 when nothing was scored
    pub avg_bits_per_token: f64,
    /// Number of scored positions (`L - 1` for the model estimator)
    pub transitions: usize,
}

impl EntropyEstimate {
    /// Result for a text with nothing to score
    pub const ZERO: Self = Self {
        total_bits: 0.0,
        avg_bits_per_token: 0.0,
        transitions: 0,
    };

    /// Build from a total and a transition count
    pub fn from_total(total_bits: f64, transitions: usize) -> Self {
        if transitions == 0 {
            return Self::ZERO;
        }
        Self {
            total_bits,
            avg_bits_per_token: total_bits / transitions as f64,
            transitions,
        }
    }

    /// Token count as derived from the two aggregates.
    ///
    /// `total_bits / avg_bits_per_token` rounded to the nearest integer, or 0
    /// when the average is not positive.
    pub fn token_count(&self) -> usize {
        if self.avg_bits_per_token > 0.0 {
            (self.total_bits / self.avg_bits_per_token).round() as usize
        } else {
            0
        }
    }
}

/// Surprisal of a single scored position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSurprisal {
    /// Index of the scored token in the sequence (>= 1)
    pub position: usize,
    pub token_id: u32,
    /// Decoded token, escaped for single-line display
    pub token: String,
    /// Probability used for scoring (after overflow handling)
    pub probability: f64,
    /// `-log2(probability)`
    pub bits: f64,
}

/// Information content of an event with probability `p`, in bits
pub fn surprisal_bits(p: f64) -> f64 {
    -p.log2()
}

/// Anything that turns a text into an [`EntropyEstimate`]
///
/// Implemented by the model-based [`SurprisalEstimator`] and by the
/// frequency heuristics in [`crate::heuristic`].
pub trait TextEstimator {
    /// Short identifier used in reports
    fn method(&self) -> &'static str;

    fn estimate(&self, text: &str) -> Result<EntropyEstimate, EstimateError>;
}

/// Estimates per-text surprisal from a tokenizer and a next-token oracle
pub struct SurprisalEstimator<T, O> {
    tokenizer: T,
    oracle: O,
    overflow: OverflowPolicy,
}

impl<T: TokenizerAdapter, O: NextTokenOracle> SurprisalEstimator<T, O> {
    /// Create an estimator with the default overflow policy
    pub fn new(tokenizer: T, oracle: O) -> Self {
        Self {
            tokenizer,
            oracle,
            overflow: OverflowPolicy::default(),
        }
    }

    /// Set the policy for probabilities above 1.0
    pub fn with_overflow_policy(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Estimate the information content of `text`
    pub fn estimate(&self, text: &str) -> Result<EntropyEstimate, EstimateError> {
        let tokens = self.tokenizer.encode(text)?;
        self.score(&tokens, None)
    }

    /// Same as [`estimate`](Self::estimate), reporting every scored position
    /// to `observer` in order
    pub fn estimate_with_trace<F>(
        &self,
        text: &str,
        mut observer: F,
    ) -> Result<EntropyEstimate, EstimateError>
    where
        F: FnMut(&TokenSurprisal),
    {
        let tokens = self.tokenizer.encode(text)?;
        self.score(&tokens, Some(&mut observer))
    }

    /// Score an already-tokenized sequence
    pub fn estimate_tokens(&self, tokens: &[u32]) -> Result<EntropyEstimate, EstimateError> {
        self.score(tokens, None)
    }

    /// Tokens are only decoded when an observer is attached
    fn score(
        &self,
        tokens: &[u32],
        mut observer: Option<&mut dyn FnMut(&TokenSurprisal)>,
    ) -> Result<EntropyEstimate, EstimateError> {
        if tokens.len() <= 1 {
            return Ok(EntropyEstimate::ZERO);
        }

        let mut total_bits = 0.0_f64;
        for position in 1..tokens.len() {
            let token_id = tokens[position];
            let prefix = &tokens[..position];

            let raw = self
                .oracle
                .probability_of(token_id, prefix)
                .map_err(|source| EstimateError::Oracle { position, source })?;
            let probability = self.check_probability(raw, position, token_id)?;

            let bits = surprisal_bits(probability);
            total_bits += bits;

            if let Some(observer) = observer.as_mut() {
                observer(&TokenSurprisal {
                    position,
                    token_id,
                    token: format_token(&self.tokenizer.decode(token_id)),
                    probability,
                    bits,
                });
            }
        }

        Ok(EntropyEstimate::from_total(total_bits, tokens.len() - 1))
    }

    fn check_probability(&self, p: f64, position: usize, token_id: u32) -> Result<f64, EstimateError> {
        if p.is_nan() || p <= 0.0 {
            return Err(EstimateError::InvalidProbability {
                position,
                token_id,
                token: format_token(&self.tokenizer.decode(token_id)),
                probability: p,
            });
        }
        if p > 1.0 {
            return match self.overflow {
                OverflowPolicy::Clamp => Ok(1.0),
                OverflowPolicy::Reject => Err(EstimateError::ProbabilityAboveOne {
                    position,
                    token_id,
                    token: format_token(&self.tokenizer.decode(token_id)),
                    probability: p,
                }),
            };
        }
        Ok(p)
    }
}

impl<T: TokenizerAdapter, O: NextTokenOracle> TextEstimator for SurprisalEstimator<T, O> {
    fn method(&self) -> &'static str {
        "model"
    }

    fn estimate(&self, text: &str) -> Result<EntropyEstimate, EstimateError> {
        SurprisalEstimator::estimate(self, text)
    }
}
