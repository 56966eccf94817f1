//! Causal attention mask shared by the forward passes
//!
//! Every oracle query runs a full forward pass over a prefix, and a text of
//! `L` tokens asks for prefixes of length `1..L`. Only the largest mask built
//! so far is kept per `(device, dtype)`; shorter masks are `narrow` views of
//! its top-left corner, so memory stays at one `L x L` mask.

use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

type MaskKey = (u8, DType);

static CAUSAL_MASKS: LazyLock<Mutex<HashMap<MaskKey, Tensor>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn device_kind(device: &Device) -> u8 {
    match device {
        Device::Cpu => 0,
        Device::Cuda(_) => 1,
        Device::Metal(_) => 2,
    }
}

fn build_mask(seq_len: usize, device: &Device, dtype: DType) -> Result<Tensor> {
    let values: Vec<f32> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| if j <= i { 0.0 } else { f32::NEG_INFINITY }))
        .collect();
    Ok(Tensor::from_vec(values, (1, 1, seq_len, seq_len), device)?.to_dtype(dtype)?)
}

fn corner(mask: &Tensor, seq_len: usize) -> Result<Tensor> {
    Ok(mask.narrow(2, 0, seq_len)?.narrow(3, 0, seq_len)?)
}

/// Additive causal mask of shape `[1, 1, seq_len, seq_len]`.
///
/// Entry `(i, j)` is `0.0` when `j <= i` and `-inf` otherwise, so position
/// `i` only attends to itself and earlier positions.
pub fn causal_mask(seq_len: usize, device: &Device, dtype: DType) -> Result<Tensor> {
    let key = (device_kind(device), dtype);
    let mut cache = CAUSAL_MASKS
        .lock()
        .map_err(|_| anyhow::anyhow!("causal mask cache poisoned"))?;

    if let Some(mask) = cache.get(&key) {
        if mask.dim(2)? >= seq_len {
            return corner(mask, seq_len);
        }
    }

    let mask = build_mask(seq_len, device, dtype)?;
    cache.insert(key, mask.clone());
    Ok(mask)
}

/// Number of masks currently cached
pub fn cached_masks() -> usize {
    CAUSAL_MASKS.lock().map_or(0, |cache| cache.len())
}

/// Total elements held by the mask cache
pub fn cached_elements() -> usize {
    CAUSAL_MASKS
        .lock()
        .map_or(0, |cache| cache.values().map(Tensor::elem_count).sum())
}

/// Drop every cached mask
pub fn clear_masks() {
    if let Ok(mut cache) = CAUSAL_MASKS.lock() {
        cache.clear();
    }
}
