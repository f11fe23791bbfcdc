//! Building blocks of the fusion network.
//!
//! Parameter names follow the trained module tree so a safetensors export of
//! the trained state dict binds without renaming. All blocks are
//! inference-only: dropout is absent and layer normalization has no running
//! statistics, so forward evaluation is deterministic.

use candle_core::{Module, Result, Tensor, D};
use candle_nn::{LayerNorm, Linear, VarBuilder};

/// Epsilon of every layer normalization in the network.
pub const LAYER_NORM_EPS: f64 = 1e-5;

/// Exact (erf-based) GELU, matching the trained activation.
pub fn gelu(x: &Tensor) -> Result<Tensor> {
    x.gelu_erf()
}

pub fn layer_norm(dim: usize, vb: VarBuilder) -> Result<LayerNorm> {
    candle_nn::layer_norm(dim, LAYER_NORM_EPS, vb)
}

// ---------------------------------------------------------------------------
// ResidualBlock
// ---------------------------------------------------------------------------

/// Two projection/normalization stages with an additive shortcut.
///
/// ```text
/// x ─┬─ linear1 → norm1 → GELU → linear2 → norm2 ─(+)─ GELU →
///    └─ shortcut (identity or linear) ────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    linear1: Linear,
    norm1: LayerNorm,
    linear2: Linear,
    norm2: LayerNorm,
    shortcut: Option<Linear>,
}

impl ResidualBlock {
    pub fn new(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let linear1 = candle_nn::linear(in_dim, out_dim, vb.pp("linear1"))?;
        let norm1 = layer_norm(out_dim, vb.pp("norm1"))?;
        let linear2 = candle_nn::linear(out_dim, out_dim, vb.pp("linear2"))?;
        let norm2 = layer_norm(out_dim, vb.pp("norm2"))?;
        let shortcut = if in_dim == out_dim {
            None
        } else {
            Some(candle_nn::linear(in_dim, out_dim, vb.pp("shortcut"))?)
        };
        Ok(Self {
            linear1,
            norm1,
            linear2,
            norm2,
            shortcut,
        })
    }
}

impl Module for ResidualBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let residual = match &self.shortcut {
            Some(proj) => proj.forward(x)?,
            None => x.clone(),
        };
        let h = gelu(&self.norm1.forward(&self.linear1.forward(x)?)?)?;
        let h = self.norm2.forward(&self.linear2.forward(&h)?)?;
        gelu(&h.add(&residual)?)
    }
}

// ---------------------------------------------------------------------------
// MultiheadAttention
// ---------------------------------------------------------------------------

/// Scaled dot-product attention over `num_heads` heads with a packed input
/// projection (`in_proj_weight` rows are query, key, value in that order).
///
/// Inputs are batch-first: query `[batch, q_len, embed]`, key/value
/// `[batch, kv_len, embed]`.
#[derive(Debug, Clone)]
pub struct MultiheadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl MultiheadAttention {
    pub fn new(embed_dim: usize, num_heads: usize, vb: VarBuilder) -> Result<Self> {
        if num_heads == 0 || embed_dim % num_heads != 0 {
            candle_core::bail!("embed_dim {embed_dim} is not divisible by num_heads {num_heads}");
        }
        let in_proj_weight = vb.get_with_hints(
            (3 * embed_dim, embed_dim),
            "in_proj_weight",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let in_proj_bias =
            vb.get_with_hints(3 * embed_dim, "in_proj_bias", candle_nn::Init::Const(0.))?;
        let packed = |chunk: usize| -> Result<Linear> {
            Ok(Linear::new(
                in_proj_weight.narrow(0, chunk * embed_dim, embed_dim)?,
                Some(in_proj_bias.narrow(0, chunk * embed_dim, embed_dim)?),
            ))
        };
        Ok(Self {
            q_proj: packed(0)?,
            k_proj: packed(1)?,
            v_proj: packed(2)?,
            out_proj: candle_nn::linear(embed_dim, embed_dim, vb.pp("out_proj"))?,
            num_heads,
            head_dim: embed_dim / num_heads,
        })
    }

    /// Attend from `query` over `key_value` (used as both keys and values).
    pub fn forward(&self, query: &Tensor, key_value: &Tensor) -> Result<Tensor> {
        let (batch, q_len, embed_dim) = query.dims3()?;
        let kv_len = key_value.dim(1)?;

        let q = self
            .split_heads(&self.q_proj.forward(query)?, batch, q_len)?
            .affine(1.0 / (self.head_dim as f64).sqrt(), 0.0)?;
        let k = self.split_heads(&self.k_proj.forward(key_value)?, batch, kv_len)?;
        let v = self.split_heads(&self.v_proj.forward(key_value)?, batch, kv_len)?;

        // [batch, heads, q_len, kv_len]
        let scores = q.matmul(&k.t()?.contiguous()?)?;
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, q_len, embed_dim))?;
        self.out_proj.forward(&context)
    }

    /// `[batch, len, embed]` → `[batch, heads, len, head_dim]`.
    fn split_heads(&self, x: &Tensor, batch: usize, len: usize) -> Result<Tensor> {
        x.reshape((batch, len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

// ---------------------------------------------------------------------------
// Bilinear
// ---------------------------------------------------------------------------

/// `y_k = x1ᵀ W_k x2 + b_k` for a weight of shape `[out, in1, in2]`.
#[derive(Debug, Clone)]
pub struct Bilinear {
    /// Weight rearranged to `[in1, out * in2]` for a single matmul.
    weight: Tensor,
    bias: Tensor,
    out_dim: usize,
    in2_dim: usize,
}

impl Bilinear {
    pub fn new(in1_dim: usize, in2_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(
            (out_dim, in1_dim, in2_dim),
            "weight",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let bias = vb.get_with_hints(out_dim, "bias", candle_nn::Init::Const(0.))?;
        let weight = weight
            .transpose(0, 1)?
            .contiguous()?
            .reshape((in1_dim, out_dim * in2_dim))?;
        Ok(Self {
            weight,
            bias,
            out_dim,
            in2_dim,
        })
    }

    /// `x1`: `[batch, in1]`, `x2`: `[batch, in2]` → `[batch, out]`.
    pub fn forward(&self, x1: &Tensor, x2: &Tensor) -> Result<Tensor> {
        let batch = x1.dim(0)?;
        let projected = x1
            .matmul(&self.weight)?
            .reshape((batch, self.out_dim, self.in2_dim))?;
        projected
            .broadcast_mul(&x2.unsqueeze(1)?)?
            .sum(2)?
            .broadcast_add(&self.bias)
    }
}
