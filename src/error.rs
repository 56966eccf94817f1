//! Error types for surprisal estimation

use thiserror::Error;

/// The tokenizer could not encode the input text.
#[derive(Error, Debug)]
#[error("tokenization failed: {0}")]
pub struct TokenizationError(pub String);

/// Errors surfaced by [`crate::SurprisalEstimator`].
///
/// Every variant is fatal to the evaluation of the current text; the
/// estimator never returns a partial total.
#[derive(Error, Debug)]
pub enum EstimateError {
    #[error(transparent)]
    Tokenization(#[from] TokenizationError),

    /// The oracle assigned zero, negative or NaN mass to the token that
    /// actually occurred.
    #[error("invalid probability {probability} for token \"{token}\" (id {token_id}) at position {position}")]
    InvalidProbability {
        position: usize,
        token_id: u32,
        token: String,
        probability: f64,
    },

    /// The oracle returned more than 1.0 and the estimator was configured
    /// with [`crate::OverflowPolicy::Reject`].
    #[error("probability {probability} exceeds 1.0 for token \"{token}\" (id {token_id}) at position {position}")]
    ProbabilityAboveOne {
        position: usize,
        token_id: u32,
        token: String,
        probability: f64,
    },

    #[error("oracle failed at position {position}: {source}")]
    Oracle {
        position: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl EstimateError {
    /// Token position the error refers to, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            EstimateError::Tokenization(_) => None,
            EstimateError::InvalidProbability { position, .. }
            | EstimateError::ProbabilityAboveOne { position, .. }
            | EstimateError::Oracle { position, .. } => Some(*position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EstimateError::InvalidProbability {
            position: 2,
            token_id: 7,
            token: " sat".to_string(),
            probability: 0.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid probability"));
        assert!(msg.contains("\" sat\""));
        assert!(msg.contains("position 2"));

        let err: EstimateError = TokenizationError("bad input".to_string()).into();
        assert_eq!(err.to_string(), "tokenization failed: bad input");
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_oracle_error_keeps_source() {
        let err = EstimateError::Oracle {
            position: 4,
            source: anyhow::anyhow!("out of memory"),
        };
        assert_eq!(err.position(), Some(4));
        assert!(err.to_string().contains("out of memory"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
