//! GPT-2 forward pass
//!
//! Decoder-only transformer with learned absolute position embeddings,
//! pre-LayerNorm blocks and an LM head tied to the token embeddings.
//! HuggingFace stores the projections as `Conv1D` modules whose weights are
//! laid out `[in, out]`; they are transposed on load into ordinary
//! `candle_nn::Linear` layers.

use anyhow::{Context, Result};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, Linear, VarBuilder};
use tracing::info;

use crate::masks::causal_mask;
use crate::model::{LanguageModel, ModelFiles};

/// Model configuration (matches HuggingFace config.json for GPT-2)
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Gpt2Config {
    pub n_embd: usize,
    pub n_head: usize,
    pub n_layer: usize,
    pub n_positions: usize,
    pub vocab_size: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

/// Load a `Conv1D` (`weight: [in, out]`, `bias: [out]`) as a `Linear`
fn conv1d(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let weight = vb.get((in_dim, out_dim), "weight")?.t()?.contiguous()?;
    let bias = vb.get(out_dim, "bias")?;
    Ok(Linear::new(weight, Some(bias)))
}

struct Attention {
    c_attn: Linear,
    c_proj: Linear,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let d = config.n_embd;
        Ok(Self {
            c_attn: conv1d(d, 3 * d, vb.pp("c_attn"))?,
            c_proj: conv1d(d, d, vb.pp("c_proj"))?,
            n_head: config.n_head,
            head_dim: d / config.n_head,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, seq_len, d) = x.dims3()?;

        let qkv = self.c_attn.forward(x)?;
        let split = |i: usize| -> Result<Tensor> {
            Ok(qkv
                .narrow(2, i * d, d)?
                .reshape((b, seq_len, self.n_head, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()?)
        };
        let q = split(0)?;
        let k = split(1)?;
        let v = split(2)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let scores = (q.matmul(&k.t()?.contiguous()?)? * scale)?;
        let mask = causal_mask(seq_len, x.device(), x.dtype())?;
        let weights = candle_nn::ops::softmax_last_dim(&scores.broadcast_add(&mask)?)?;

        let out = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b, seq_len, d))?;
        Ok(self.c_proj.forward(&out)?)
    }
}

#[allow(clippy::upper_case_acronyms)]
struct MLP {
    c_fc: Linear,
    c_proj: Linear,
}

impl MLP {
    fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let d = config.n_embd;
        Ok(Self {
            c_fc: conv1d(d, 4 * d, vb.pp("c_fc"))?,
            c_proj: conv1d(4 * d, d, vb.pp("c_proj"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // gelu_new (tanh approximation)
        let hidden = self.c_fc.forward(x)?.gelu()?;
        Ok(self.c_proj.forward(&hidden)?)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: MLP,
}

impl Block {
    fn load(vb: VarBuilder, config: &Gpt2Config) -> Result<Self> {
        let eps = config.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(config.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(vb.pp("attn"), config)?,
            ln_2: layer_norm(config.n_embd, eps, vb.pp("ln_2"))?,
            mlp: MLP::load(vb.pp("mlp"), config)?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let residual = x;
        let x = self.attn.forward(&self.ln_1.forward(x)?)?;
        let x = (residual + x)?;

        let residual = &x;
        let x = self.mlp.forward(&self.ln_2.forward(&x)?)?;
        Ok((residual + x)?)
    }
}

/// GPT-2 language model producing next-token logits
pub struct Gpt2 {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    config: Gpt2Config,
}

impl Gpt2 {
    /// Load weights and config from downloaded model files
    pub fn load(files: &ModelFiles, device: &Device, dtype: DType) -> Result<Self> {
        let config: Gpt2Config = files.read_config()?;
        info!(
            "GPT-2 config: {} layers, {} hidden, {} heads, {} vocab",
            config.n_layer, config.n_embd, config.n_head, config.vocab_size
        );

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, device)? };
        // Fine-tuned checkpoints saved from GPT2LMHeadModel carry a `transformer.` prefix
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };

        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;

        let mut blocks = Vec::with_capacity(config.n_layer);
        for i in 0..config.n_layer {
            let block = Block::load(vb.pp(format!("h.{i}")), &config)
                .with_context(|| format!("Failed to load block {i}"))?;
            blocks.push(block);
        }

        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;

        info!("GPT-2 loaded with {} blocks", blocks.len());

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            config,
        })
    }

    /// Final hidden states `[batch, seq, n_embd]`
    fn hidden_states(&self, input_ids: &Tensor) -> Result<Tensor> {
        let seq_len = input_ids.dim(1)?;
        anyhow::ensure!(
            seq_len <= self.config.n_positions,
            "prefix of {seq_len} tokens exceeds the {} position context",
            self.config.n_positions
        );

        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?;
        let tokens = self.wte.forward(input_ids)?;
        let positions = self.wpe.forward(&positions)?;
        let mut hidden = tokens.broadcast_add(&positions)?;

        for block in &self.blocks {
            hidden = block.forward(&hidden)?;
        }

        Ok(self.ln_f.forward(&hidden)?)
    }
}

impl LanguageModel for Gpt2 {
    fn n_layers(&self) -> usize {
        self.config.n_layer
    }

    fn d_model(&self) -> usize {
        self.config.n_embd
    }

    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn max_positions(&self) -> usize {
        self.config.n_positions
    }

    fn next_token_logits(&self, input_ids: &Tensor) -> Result<Tensor> {
        let hidden = self.hidden_states(input_ids)?;
        let seq_len = hidden.dim(1)?;
        let last = hidden.i((0, seq_len - 1))?;
        // Tied LM head: logits = h @ wte^T
        let logits = last
            .unsqueeze(0)?
            .matmul(&self.wte.embeddings().t()?)?
            .squeeze(0)?;
        Ok(logits)
    }
}
