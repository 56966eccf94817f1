//! Next-token probability oracle

use anyhow::Result;

/// Scores how likely a token is to follow a prefix.
///
/// Implementations must be a pure function of (weights, prefix, token):
/// any caching they do must not change the returned value. Each call is
/// expected to be expensive (one forward pass over `prefix`).
pub trait NextTokenOracle {
    /// Probability in `[0, 1]` that `token_id` comes right after `prefix`.
    ///
    /// `prefix` is never empty when called by the estimator.
    fn probability_of(&self, token_id: u32, prefix: &[u32]) -> Result<f64>;
}

impl<O: NextTokenOracle + ?Sized> NextTokenOracle for &O {
    fn probability_of(&self, token_id: u32, prefix: &[u32]) -> Result<f64> {
        (**self).probability_of(token_id, prefix)
    }
}

impl<O: NextTokenOracle + ?Sized> NextTokenOracle for Box<O> {
    fn probability_of(&self, token_id: u32, prefix: &[u32]) -> Result<f64> {
        (**self).probability_of(token_id, prefix)
    }
}

/// Adapts a closure `Fn(token_id, prefix) -> Result<f64>` into an oracle
pub struct FnOracle<F>(pub F);

impl<F> NextTokenOracle for FnOracle<F>
where
    F: Fn(u32, &[u32]) -> Result<f64>,
{
    fn probability_of(&self, token_id: u32, prefix: &[u32]) -> Result<f64> {
        (self.0)(token_id, prefix)
    }
}
