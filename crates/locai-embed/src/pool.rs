use anyhow::{Result, bail};
use candle_core::{DType, Tensor};

/// Mean-pool `[B, T, H]` hidden states over unmasked tokens, then L2-normalise
/// each row. Returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, hidden_dim) = match hidden.dims() {
        &[b, t, h] => (b, t, h),
        dims => bail!("hidden states must be [B,T,H], got {:?}", dims),
    };
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    // all-padding rows would divide by zero
    let counts = mask.sum(1)?.maximum(1e-9f64)?;
    let mean = summed.broadcast_div(&counts)?;
    let eps = match hidden.dtype() { DType::F16 | DType::BF16 => 1e-6f64, _ => 1e-12f64 };
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(eps)?;
    let pooled = mean.broadcast_div(&norms)?;
    if pooled.dims() != [batch, hidden_dim] { bail!("pooled shape {:?} != [{}, {}]", pooled.dims(), batch, hidden_dim); }
    Ok(pooled)
}
