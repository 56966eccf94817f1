//! Pretrained language model as a tokenizer adapter and next-token oracle
//!
//! `SurprisalModel` owns a HuggingFace tokenizer and one of the supported
//! candle backends. It is loaded once and then shared by reference with a
//! [`crate::SurprisalEstimator`], acting as both of its collaborators.

use anyhow::{Context, Result};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::TokenizationError;
use crate::forward_gpt2::Gpt2;
use crate::forward_llama::Llama;
use crate::oracle::NextTokenOracle;
use crate::tokenizer::TokenizerAdapter;

/// Supported model architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelArchitecture {
    /// GPT-2 and its distilled/fine-tuned variants (OpenAI)
    Gpt2,
    /// LLaMA and checkpoints sharing its layout (Meta, TinyLlama, SmolLM)
    Llama,
}

impl ModelArchitecture {
    /// Detect architecture from a model ID or local path
    pub fn from_model_id(model_id: &str) -> Self {
        let model_lower = model_id.to_lowercase();
        if model_lower.contains("gpt2") || model_lower.contains("gpt-2") {
            ModelArchitecture::Gpt2
        } else if model_lower.contains("llama") || model_lower.contains("smollm") {
            ModelArchitecture::Llama
        } else {
            info!("Unknown architecture for {}, assuming GPT-2 layout", model_id);
            ModelArchitecture::Gpt2
        }
    }

    /// Detect architecture from the `model_type` field of a config.json
    pub fn from_model_type(model_type: &str) -> Option<Self> {
        match model_type {
            "gpt2" => Some(ModelArchitecture::Gpt2),
            "llama" | "mistral" => Some(ModelArchitecture::Llama),
            _ => None,
        }
    }

    /// Weight dtype on an accelerator.
    ///
    /// LLaMA-family checkpoints are trained in bfloat16; GPT-2 is kept in
    /// F32 since its published weights are F32 and the model is small.
    fn accelerator_dtype(self) -> DType {
        match self {
            ModelArchitecture::Gpt2 => DType::F32,
            ModelArchitecture::Llama => DType::BF16,
        }
    }
}

/// Backend capability: logits for the token following a prefix
pub trait LanguageModel {
    fn n_layers(&self) -> usize;
    fn d_model(&self) -> usize;
    fn vocab_size(&self) -> usize;
    /// Longest prefix the model can condition on
    fn max_positions(&self) -> usize;

    /// Logits `[vocab]` for the position after the last token of
    /// `input_ids` (`[1, seq_len]`)
    fn next_token_logits(&self, input_ids: &Tensor) -> Result<Tensor>;
}

/// Files needed to build a model: config, tokenizer and weights
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Safetensors index for sharded models
#[derive(Debug, serde::Deserialize)]
struct SafetensorsIndex {
    weight_map: std::collections::HashMap<String, String>,
}

fn shard_names(index_path: &Path) -> Result<Vec<String>> {
    let index_str = std::fs::read_to_string(index_path).context("Failed to read index")?;
    let index: SafetensorsIndex = serde_json::from_str(&index_str)?;
    let mut names: Vec<String> = index.weight_map.into_values().collect();
    names.sort();
    names.dedup();
    Ok(names)
}

impl ModelFiles {
    /// Download (or reuse cached) files from the HuggingFace Hub
    pub fn from_hub(model_id: &str) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config = repo
            .get("config.json")
            .context("Failed to download config.json")?;
        let tokenizer = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer.json")?;

        let weights = if let Ok(index_path) = repo.get("model.safetensors.index.json") {
            info!("Model is sharded, loading index...");
            let names = shard_names(&index_path)?;
            info!("Downloading {} shard files...", names.len());
            names
                .iter()
                .map(|name| {
                    repo.get(name)
                        .with_context(|| format!("Failed to download {name}"))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![repo
                .get("model.safetensors")
                .context("Failed to download model.safetensors")?]
        };

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    /// Use files already present in a local directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join("config.json");
        let tokenizer = dir.join("tokenizer.json");
        anyhow::ensure!(config.is_file(), "Missing {}", config.display());
        anyhow::ensure!(tokenizer.is_file(), "Missing {}", tokenizer.display());

        let index_path = dir.join("model.safetensors.index.json");
        let weights = if index_path.is_file() {
            shard_names(&index_path)?
                .into_iter()
                .map(|name| dir.join(name))
                .collect()
        } else {
            vec![dir.join("model.safetensors")]
        };
        for path in &weights {
            anyhow::ensure!(path.is_file(), "Missing {}", path.display());
        }

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    /// Resolve a model argument: an existing directory is used as-is,
    /// anything else is treated as a Hub model ID
    pub fn resolve(model: &str) -> Result<Self> {
        let path = Path::new(model);
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_hub(model)
        }
    }

    /// Deserialize config.json
    pub fn read_config<T: DeserializeOwned>(&self) -> Result<T> {
        let config_str = std::fs::read_to_string(&self.config).context("Failed to read config")?;
        Ok(serde_json::from_str(&config_str)?)
    }

    /// `model_type` field of config.json, if present
    pub fn model_type(&self) -> Result<Option<String>> {
        #[derive(serde::Deserialize)]
        struct ModelType {
            model_type: Option<String>,
        }
        Ok(self.read_config::<ModelType>()?.model_type)
    }
}

/// Tokenizer + language model, loaded once and reused for every text
pub struct SurprisalModel {
    model: Box<dyn LanguageModel + Send + Sync>,
    tokenizer: Tokenizer,
    device: Device,
    architecture: ModelArchitecture,
    model_id: String,
}

impl SurprisalModel {
    /// Load a model (tries CUDA, falls back to CPU)
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        Self::from_pretrained_with_device(model_id, false)
    }

    /// Load with explicit device choice
    ///
    /// `model_id` may be a HuggingFace model ID or a local directory. The
    /// architecture comes from config.json's `model_type`, falling back to
    /// the model ID.
    pub fn from_pretrained_with_device(model_id: &str, force_cpu: bool) -> Result<Self> {
        let files = ModelFiles::resolve(model_id)?;
        let architecture = files
            .model_type()?
            .as_deref()
            .and_then(ModelArchitecture::from_model_type)
            .unwrap_or_else(|| ModelArchitecture::from_model_id(model_id));
        Self::from_files(model_id, &files, architecture, force_cpu)
    }

    /// Build from resolved files with an explicit architecture
    pub fn from_files(
        model_id: &str,
        files: &ModelFiles,
        architecture: ModelArchitecture,
        force_cpu: bool,
    ) -> Result<Self> {
        let (device, dtype) = if force_cpu {
            info!("Forcing CPU mode");
            (Device::Cpu, DType::F32)
        } else {
            match Device::cuda_if_available(0) {
                Ok(dev) if dev.is_cuda() => {
                    info!("Using CUDA device");
                    (dev, architecture.accelerator_dtype())
                }
                _ => {
                    info!("CUDA not available, using CPU");
                    (Device::Cpu, DType::F32)
                }
            }
        };

        info!("Loading model: {}", model_id);
        info!("Architecture: {:?}", architecture);
        info!("Device: {:?}", device);
        info!("Dtype: {:?}", dtype);

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow::anyhow!("Tokenizer error: {e}"))?;

        let model: Box<dyn LanguageModel + Send + Sync> = match architecture {
            ModelArchitecture::Gpt2 => Box::new(Gpt2::load(files, &device, dtype)?),
            ModelArchitecture::Llama => Box::new(Llama::load(files, &device, dtype)?),
        };

        Ok(Self {
            model,
            tokenizer,
            device,
            architecture,
            model_id: model_id.to_string(),
        })
    }

    pub fn architecture(&self) -> ModelArchitecture {
        self.architecture
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn n_layers(&self) -> usize {
        self.model.n_layers()
    }

    pub fn d_model(&self) -> usize {
        self.model.d_model()
    }

    pub fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    pub fn max_positions(&self) -> usize {
        self.model.max_positions()
    }

    /// Log-probabilities `[vocab]` (F32) of the token following `prefix`
    pub fn next_token_log_probs(&self, prefix: &[u32]) -> Result<Tensor> {
        anyhow::ensure!(!prefix.is_empty(), "Cannot predict from an empty prefix");
        let input = Tensor::new(prefix, &self.device)?.unsqueeze(0)?;
        let logits = self.model.next_token_logits(&input)?.to_dtype(DType::F32)?;
        Ok(candle_nn::ops::log_softmax(&logits, D::Minus1)?)
    }
}

impl TokenizerAdapter for SurprisalModel {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizationError> {
        TokenizerAdapter::encode(&self.tokenizer, text)
    }

    fn decode(&self, token_id: u32) -> String {
        TokenizerAdapter::decode(&self.tokenizer, token_id)
    }
}

impl NextTokenOracle for SurprisalModel {
    fn probability_of(&self, token_id: u32, prefix: &[u32]) -> Result<f64> {
        let vocab = self.vocab_size();
        anyhow::ensure!(
            (token_id as usize) < vocab,
            "Token id {token_id} outside vocabulary of {vocab}"
        );

        let log_probs = self.next_token_log_probs(prefix)?;
        let log_p = log_probs.i(token_id as usize)?.to_scalar::<f32>()?;
        debug!(
            "p(token {} | {} tokens) = {:.6}",
            token_id,
            prefix.len(),
            log_p.exp()
        );
        Ok(f64::from(log_p).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_from_model_id() {
        assert_eq!(
            ModelArchitecture::from_model_id("openai-community/gpt2"),
            ModelArchitecture::Gpt2
        );
        assert_eq!(
            ModelArchitecture::from_model_id("distilbert/distilgpt2"),
            ModelArchitecture::Gpt2
        );
        assert_eq!(
            ModelArchitecture::from_model_id("TinyLlama/TinyLlama-1.1B-Chat-v1.0"),
            ModelArchitecture::Llama
        );
        assert_eq!(
            ModelArchitecture::from_model_id("HuggingFaceTB/SmolLM2-135M"),
            ModelArchitecture::Llama
        );
    }

    #[test]
    fn test_architecture_from_model_type() {
        assert_eq!(
            ModelArchitecture::from_model_type("gpt2"),
            Some(ModelArchitecture::Gpt2)
        );
        assert_eq!(
            ModelArchitecture::from_model_type("llama"),
            Some(ModelArchitecture::Llama)
        );
        assert_eq!(ModelArchitecture::from_model_type("bert"), None);
    }

    #[test]
    fn test_model_files_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelFiles::from_dir(dir.path()).is_err());

        std::fs::write(dir.path().join("config.json"), r#"{"model_type": "gpt2"}"#).unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        std::fs::write(dir.path().join("model.safetensors"), "").unwrap();

        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert_eq!(files.weights.len(), 1);
        assert_eq!(files.model_type().unwrap().as_deref(), Some("gpt2"));
    }

    #[test]
    fn test_model_files_sharded_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("model.safetensors.index.json"),
            r#"{"weight_map": {"a": "part-2.safetensors", "b": "part-1.safetensors", "c": "part-1.safetensors"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("part-1.safetensors"), "").unwrap();
        std::fs::write(dir.path().join("part-2.safetensors"), "").unwrap();

        let files = ModelFiles::from_dir(dir.path()).unwrap();
        let names: Vec<_> = files
            .weights
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["part-1.safetensors", "part-2.safetensors"]);
        assert_eq!(files.model_type().unwrap(), None);
    }
}
