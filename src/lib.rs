// Pedantic clippy configuration for ML/math codebase
// These are acceptable in numerical/ML code:
#![allow(clippy::cast_precision_loss)] // usize→f64/f32 intentional in ML
#![allow(clippy::cast_possible_truncation)] // usize→u32 in tensor indexing
#![allow(clippy::cast_sign_loss)] // f64→usize when value is known positive
#![allow(clippy::many_single_char_names)] // b, d, h, i standard in tensor code
#![allow(clippy::module_name_repetitions)] // SurprisalModel in model.rs is fine
// Documentation pedantic:
#![allow(clippy::doc_markdown)] // backticks for every technical term is excessive
#![allow(clippy::missing_errors_doc)] // # Errors section for every Result fn
// Method style pedantic:
#![allow(clippy::must_use_candidate)] // #[must_use] on every pure fn is excessive
#![allow(clippy::return_self_not_must_use)] // #[must_use] on Self returns

//! surprisal-rs: information content of text under a language model
//!
//! Scores every token of a text by how surprising it is given the tokens
//! before it, `-log2 P(t_i | t_<i)`, and reports the total and the average
//! in bits.
//!
//! ## Architecture
//!
//! - `estimator`: SurprisalEstimator, the scoring loop and probability policy
//! - `tokenizer`: TokenizerAdapter contract (text ↔ token ids)
//! - `oracle`: NextTokenOracle contract (P(token | prefix))
//! - `error`: EstimateError and TokenizationError
//! - `model`: SurprisalModel, a HuggingFace tokenizer + candle backend
//!   implementing both contracts
//! - `forward_gpt2`: GPT-2 forward pass
//! - `forward_llama`: LLaMA-family forward pass
//! - `masks`: cached causal attention masks
//! - `heuristic`: frequency-based estimators that need no model
//! - `report`: text/JSON/trace rendering of results
//! - `config`: run configuration (JSON file + defaults)
//!
//! ## Building
//!
//! The default `cuda` feature needs the CUDA toolkit. On machines without
//! it, build and test with:
//!
//! ```bash
//! cargo build --release --no-default-features
//! cargo test --no-default-features
//! ```

pub mod config;
pub mod error;
pub mod estimator;
pub mod forward_gpt2;
pub mod forward_llama;
pub mod heuristic;
pub mod masks;
pub mod model;
pub mod oracle;
pub mod report;
pub mod tokenizer;

pub use config::{Method, OutputFormat, RunConfig};
pub use error::{EstimateError, TokenizationError};
pub use estimator::{
    surprisal_bits, EntropyEstimate, OverflowPolicy, SurprisalEstimator, TextEstimator,
    TokenSurprisal,
};
pub use forward_gpt2::Gpt2;
pub use forward_llama::Llama;
pub use heuristic::{ShannonAnalysis, ShannonEstimator, WordFrequencyAnalysis};
pub use masks::{causal_mask, clear_masks};
pub use model::{LanguageModel, ModelArchitecture, ModelFiles, SurprisalModel};
pub use oracle::{FnOracle, NextTokenOracle};
pub use report::Report;
pub use tokenizer::{format_token, TokenizerAdapter};
