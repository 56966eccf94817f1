//! Run configuration
//!
//! Settings can come from a JSON file; any field left out takes its
//! default. Command-line flags are applied on top by the binary.
//!
//! ```json
//! {
//!   "model": "openai-community/gpt2",
//!   "method": "model",
//!   "format": "json",
//!   "cpu": true,
//!   "overflow": "reject"
//! }
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::estimator::OverflowPolicy;

/// Default model: the smallest GPT-2
pub const DEFAULT_MODEL: &str = "openai-community/gpt2";

/// Text analyzed when nothing is given on the command line or stdin
pub const SAMPLE_TEXT: &str = "There is currently a lively, ongoing controversy among many \
sociologists and other professionals who study human nature : theories are being spun and \
arguments are being conducted among them about what it means that so many young people\u{2014}and \
older people, for that matter\u{2014}who live in our society today are so very interested in \
stories about zombies.?";

/// How information content is estimated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Per-token surprisal under a pretrained language model
    #[default]
    Model,
    /// Word-frequency concentration score (no model)
    WordFrequency,
    /// Character/word Shannon entropy approximation (no model)
    Shannon,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Model => "model",
            Method::WordFrequency => "word-frequency",
            Method::Shannon => "shannon",
        }
    }
}

/// Output rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for one run of the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// HuggingFace model ID or local model directory
    pub model: String,
    pub method: Method,
    pub format: OutputFormat,
    /// Force CPU even when CUDA is available
    pub cpu: bool,
    /// Print a per-token trace to stderr
    pub debug: bool,
    /// Handling of probabilities above 1.0
    pub overflow: OverflowPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            method: Method::default(),
            format: OutputFormat::default(),
            cpu: false,
            debug: false,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}
