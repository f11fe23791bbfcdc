//! Multimodal fusion regressor over tabular, image, and text representations.
//!
//! # Architecture
//!
//! ```text
//! tab [17] ─── ResBlock(128) → ResBlock(64) ─┐
//! img [D_i] ── ResBlock(128) → ResBlock(64) ─┼─ cross-attention (6 ordered pairs, 4 heads)
//! text [D_t] ─ ResBlock(128) → ResBlock(64) ─┘        │  x + 0.5·(a→b + a→c), LayerNorm
//!                                                     ▼
//!                        3 × 64 refined  +  3 × Bilinear(64, 64 → 32) → LayerNorm → GELU
//!                                                     │
//!                                       concat [288] → Linear(6) → Sigmoid gates
//!                                                     │
//!                                       gated concat [288]
//!                                                     │
//!            Linear(128) → GELU → LayerNorm → ResBlock(64) → Linear(1)
//! ```
//!
//! Parameter names mirror the trained module tree (`tabular_block.0.linear1.weight`,
//! `tab2img_attn.in_proj_weight`, `bilinear_tab_img.weight`, `fusion_gate.0.weight`,
//! `final.4.norm2.bias`, ...), so the network binds directly to a safetensors
//! export of the trained state dict.
//!
//! # Lifecycle
//!
//! [`FusionModel`] starts `Uninitialized` and becomes `Ready` once weights are
//! bound. Ready models are frozen: there is no dropout and no batch-statistics
//! normalization, so every row's output depends only on that row.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{LayerNorm, Linear, VarBuilder, VarMap};
use propfusion_core::{ModelDimensions, PropFusionError, Result, FEATURE_COUNT};

use crate::layers::{gelu, layer_norm, Bilinear, MultiheadAttention, ResidualBlock};

/// Width of the shared modality representation.
pub const COMMON_DIM: usize = 64;

/// Hidden width of the first residual block in each branch and of the regressor.
pub const HIDDEN_DIM: usize = 128;

/// Width of each pairwise interaction vector.
pub const INTERACTION_DIM: usize = 32;

/// Attention heads per cross-modal attention block.
pub const NUM_HEADS: usize = 4;

/// Width of the concatenated fusion vector (3 × 64 + 3 × 32).
pub const FUSED_DIM: usize = 3 * COMMON_DIM + 3 * INTERACTION_DIM;

/// One gate per modality vector and per interaction vector.
const NUM_GATES: usize = 6;

// ---------------------------------------------------------------------------
// Sub-networks
// ---------------------------------------------------------------------------

/// Two chained residual blocks: `in_dim → 128 → 64`.
#[derive(Debug, Clone)]
struct BranchEncoder {
    blocks: [ResidualBlock; 2],
}

impl BranchEncoder {
    fn new(in_dim: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            blocks: [
                ResidualBlock::new(in_dim, HIDDEN_DIM, vb.pp("0"))?,
                ResidualBlock::new(HIDDEN_DIM, COMMON_DIM, vb.pp("1"))?,
            ],
        })
    }
}

impl Module for BranchEncoder {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        self.blocks[1].forward(&self.blocks[0].forward(x)?)
    }
}

/// Bilinear pair map followed by LayerNorm and GELU.
#[derive(Debug, Clone)]
struct PairInteraction {
    bilinear: Bilinear,
    norm: LayerNorm,
}

impl PairInteraction {
    fn new(vb: &VarBuilder, pair: &str) -> candle_core::Result<Self> {
        Ok(Self {
            bilinear: Bilinear::new(
                COMMON_DIM,
                COMMON_DIM,
                INTERACTION_DIM,
                vb.pp(format!("bilinear_{pair}")),
            )?,
            norm: layer_norm(INTERACTION_DIM, vb.pp(format!("interaction_norm_{pair}")))?,
        })
    }

    fn forward(&self, a: &Tensor, b: &Tensor) -> candle_core::Result<Tensor> {
        gelu(&self.norm.forward(&self.bilinear.forward(a, b)?)?)
    }
}

/// Both outgoing attention blocks of one modality plus its residual norm.
#[derive(Debug, Clone)]
struct CrossAttention {
    to_first: MultiheadAttention,
    to_second: MultiheadAttention,
    norm: LayerNorm,
}

impl CrossAttention {
    /// `source` attends to `first` and `second`, e.g. `("tab", "img", "text")`.
    fn new(vb: &VarBuilder, source: &str, first: &str, second: &str) -> candle_core::Result<Self> {
        Ok(Self {
            to_first: MultiheadAttention::new(
                COMMON_DIM,
                NUM_HEADS,
                vb.pp(format!("{source}2{first}_attn")),
            )?,
            to_second: MultiheadAttention::new(
                COMMON_DIM,
                NUM_HEADS,
                vb.pp(format!("{source}2{second}_attn")),
            )?,
            norm: layer_norm(COMMON_DIM, vb.pp(format!("attn_norm_{source}")))?,
        })
    }

    /// `norm(x + 0.5 · (attend(x → first) + attend(x → second)))`.
    ///
    /// Inputs are `[batch, 1, 64]`; the result is `[batch, 64]`.
    fn forward(&self, x: &Tensor, first: &Tensor, second: &Tensor) -> candle_core::Result<Tensor> {
        let a = self.to_first.forward(x, first)?;
        let b = self.to_second.forward(x, second)?;
        let mixed = a.add(&b)?.affine(0.5, 0.0)?;
        self.norm.forward(&x.add(&mixed)?.squeeze(1)?)
    }
}

/// `Linear(288→128) → GELU → LayerNorm → ResBlock(128→64) → Linear(64→1)`.
#[derive(Debug, Clone)]
struct Regressor {
    input: Linear,
    norm: LayerNorm,
    block: ResidualBlock,
    output: Linear,
}

impl Regressor {
    fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            input: candle_nn::linear(FUSED_DIM, HIDDEN_DIM, vb.pp("0"))?,
            norm: layer_norm(HIDDEN_DIM, vb.pp("2"))?,
            block: ResidualBlock::new(HIDDEN_DIM, COMMON_DIM, vb.pp("4"))?,
            output: candle_nn::linear(COMMON_DIM, 1, vb.pp("5"))?,
        })
    }
}

impl Module for Regressor {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let h = self.norm.forward(&gelu(&self.input.forward(x)?)?)?;
        self.output.forward(&self.block.forward(&h)?)
    }
}

// ---------------------------------------------------------------------------
// FusionNetwork
// ---------------------------------------------------------------------------

/// The bound, frozen fusion network.
#[derive(Debug, Clone)]
pub struct FusionNetwork {
    tabular: BranchEncoder,
    image: BranchEncoder,
    text: BranchEncoder,
    tab_attention: CrossAttention,
    img_attention: CrossAttention,
    text_attention: CrossAttention,
    tab_img: PairInteraction,
    tab_text: PairInteraction,
    img_text: PairInteraction,
    gate: Linear,
    regressor: Regressor,
    dims: ModelDimensions,
}

impl FusionNetwork {
    /// Build every sub-network from `vb`.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Model`] if a parameter is missing or has
    /// the wrong shape.
    pub fn new(dims: ModelDimensions, vb: VarBuilder) -> Result<Self> {
        Self::build(dims, &vb)
            .map_err(|e| PropFusionError::Model(format!("Failed to bind fusion weights: {e}")))
    }

    fn build(dims: ModelDimensions, vb: &VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            tabular: BranchEncoder::new(dims.tabular(), vb.pp("tabular_block"))?,
            image: BranchEncoder::new(dims.image, vb.pp("image_block"))?,
            text: BranchEncoder::new(dims.text, vb.pp("text_block"))?,
            tab_attention: CrossAttention::new(vb, "tab", "img", "text")?,
            img_attention: CrossAttention::new(vb, "img", "tab", "text")?,
            text_attention: CrossAttention::new(vb, "text", "tab", "img")?,
            tab_img: PairInteraction::new(vb, "tab_img")?,
            tab_text: PairInteraction::new(vb, "tab_text")?,
            img_text: PairInteraction::new(vb, "img_text")?,
            gate: candle_nn::linear(FUSED_DIM, NUM_GATES, vb.pp("fusion_gate").pp("0"))?,
            regressor: Regressor::new(vb.pp("final"))?,
            dims,
        })
    }

    /// Evaluate the network on a batch.
    ///
    /// `tab`: `[batch, 17]`, `img`: `[batch, D_i]`, `text`: `[batch, D_t]`,
    /// all `f32`. Returns the raw outputs as a `[batch]` tensor.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Model`] on shape mismatches or backend failures.
    pub fn forward(&self, tab: &Tensor, img: &Tensor, text: &Tensor) -> Result<Tensor> {
        let batch = tab.dim(0).map_err(model_err("Tabular input"))?;
        for (name, tensor, width) in [
            ("tabular", tab, self.dims.tabular()),
            ("image", img, self.dims.image),
            ("text", text, self.dims.text),
        ] {
            if tensor.dims() != [batch, width] {
                return Err(PropFusionError::Model(format!(
                    "{name} input has shape {:?}, expected [{batch}, {width}]",
                    tensor.dims()
                )));
            }
        }

        let tab_feat = self.tabular.forward(tab).map_err(model_err("Tabular branch"))?;
        let img_feat = self.image.forward(img).map_err(model_err("Image branch"))?;
        let text_feat = self.text.forward(text).map_err(model_err("Text branch"))?;

        let (tab_attn, img_attn, text_attn) = self
            .cross_attend(&tab_feat, &img_feat, &text_feat)
            .map_err(model_err("Cross-modal attention"))?;

        let fused = self
            .fuse(&tab_attn, &img_attn, &text_attn)
            .map_err(model_err("Gated fusion"))?;

        self.regressor
            .forward(&fused)
            .and_then(|out| out.squeeze(1))
            .map_err(model_err("Regressor"))
    }

    fn cross_attend(
        &self,
        tab: &Tensor,
        img: &Tensor,
        text: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        // Sequence length 1 per modality: [batch, 1, 64].
        let tab = tab.unsqueeze(1)?;
        let img = img.unsqueeze(1)?;
        let text = text.unsqueeze(1)?;
        Ok((
            self.tab_attention.forward(&tab, &img, &text)?,
            self.img_attention.forward(&img, &tab, &text)?,
            self.text_attention.forward(&text, &tab, &img)?,
        ))
    }

    fn fuse(&self, tab: &Tensor, img: &Tensor, text: &Tensor) -> candle_core::Result<Tensor> {
        let parts = [
            tab.clone(),
            img.clone(),
            text.clone(),
            self.tab_img.forward(tab, img)?,
            self.tab_text.forward(tab, text)?,
            self.img_text.forward(img, text)?,
        ];
        let combined = Tensor::cat(&parts, 1)?;
        let gates = candle_nn::ops::sigmoid(&self.gate.forward(&combined)?)?;

        let weighted = parts
            .iter()
            .enumerate()
            .map(|(i, part)| part.broadcast_mul(&gates.narrow(1, i, 1)?))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Tensor::cat(&weighted, 1)
    }
}

fn model_err(stage: &'static str) -> impl Fn(candle_core::Error) -> PropFusionError {
    move |e| PropFusionError::Model(format!("{stage} forward failed: {e}"))
}

// ---------------------------------------------------------------------------
// FusionModel lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ModelState {
    Uninitialized,
    Ready(Box<FusionNetwork>),
}

/// Fusion network with an explicit `Uninitialized` → `Ready` lifecycle.
///
/// # Example
///
/// ```
/// use candle_core::Device;
/// use propfusion_core::ModelDimensions;
/// use propfusion_model::FusionModel;
///
/// let dims = ModelDimensions { image: 8, text: 8 };
/// let mut model = FusionModel::uninitialized(dims, &Device::Cpu);
/// assert!(!model.is_ready());
/// model.bind_random().unwrap();
/// let out = model
///     .forward_rows(&[[0.0; 17]], &[vec![0.1; 8]], &[vec![0.2; 8]])
///     .unwrap();
/// assert_eq!(out.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FusionModel {
    state: ModelState,
    dims: ModelDimensions,
    device: Device,
}

impl FusionModel {
    /// A model with no weights bound.
    #[must_use]
    pub fn uninitialized(dims: ModelDimensions, device: &Device) -> Self {
        Self {
            state: ModelState::Uninitialized,
            dims,
            device: device.clone(),
        }
    }

    /// Load trained weights from a safetensors file into a ready model.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the weights are
    /// incompatible with the architecture.
    pub fn load(path: &Path, dims: ModelDimensions, device: &Device) -> Result<Self> {
        let mut model = Self::uninitialized(dims, device);
        model.load_weights(path)?;
        Ok(model)
    }

    /// Create a ready model with random weights.
    ///
    /// Suitable for architecture validation and tests. For production, use
    /// [`FusionModel::load`] with trained weights.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Model`] if parameter initialization fails.
    pub fn new_random(dims: ModelDimensions, device: &Device) -> Result<Self> {
        let mut model = Self::uninitialized(dims, device);
        model.bind_random()?;
        Ok(model)
    }

    /// Bind weights from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be mapped or a parameter is
    /// missing or mis-shaped. The model stays in its previous state.
    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        let paths: [PathBuf; 1] = [path.to_path_buf()];
        // SAFETY: memory-mapping safetensors is the standard candle pattern.
        // The file is read-only and remains valid for the lifetime of VarBuilder.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&paths, DType::F32, &self.device).map_err(|e| {
                PropFusionError::Model(format!(
                    "Failed to load fusion weights from {}: {e}",
                    path.display()
                ))
            })?
        };
        self.bind(vb)?;
        tracing::info!(path = %path.display(), "Fusion network weights loaded");
        Ok(())
    }

    /// Bind freshly initialized random weights.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Model`] if parameter initialization fails.
    pub fn bind_random(&mut self) -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        self.bind(vb)
    }

    /// Bind weights from any variable builder and freeze the network.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Model`] if the weights do not fit.
    pub fn bind(&mut self, vb: VarBuilder) -> Result<()> {
        let network = FusionNetwork::new(self.dims, vb)?;
        self.state = ModelState::Ready(Box::new(network));
        Ok(())
    }

    /// Returns `true` once weights are bound.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    #[must_use]
    pub fn dimensions(&self) -> ModelDimensions {
        self.dims
    }

    /// Returns a reference to the device this model runs on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Evaluate the network on batched tensors.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::UninitializedModel`] when no weights are
    /// bound, and [`PropFusionError::Model`] on shape or backend failures.
    pub fn forward(&self, tab: &Tensor, img: &Tensor, text: &Tensor) -> Result<Tensor> {
        match &self.state {
            ModelState::Ready(network) => network.forward(tab, img, text),
            ModelState::Uninitialized => Err(PropFusionError::UninitializedModel),
        }
    }

    /// Evaluate the network on row-major inputs, one row per record.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::UninitializedModel`] when no weights are
    /// bound and [`PropFusionError::Model`] when the row counts or widths
    /// disagree.
    pub fn forward_rows(
        &self,
        tab: &[[f32; FEATURE_COUNT]],
        img: &[Vec<f32>],
        text: &[Vec<f32>],
    ) -> Result<Vec<f32>> {
        if !self.is_ready() {
            return Err(PropFusionError::UninitializedModel);
        }
        let batch = tab.len();
        if img.len() != batch || text.len() != batch {
            return Err(PropFusionError::Model(format!(
                "batch size mismatch: {batch} tabular, {} image, {} text rows",
                img.len(),
                text.len()
            )));
        }
        if batch == 0 {
            return Ok(Vec::new());
        }

        let tab_tensor = self.stack("tabular", tab.iter().map(|r| r.as_slice()), FEATURE_COUNT)?;
        let img_tensor = self.stack("image", img.iter().map(Vec::as_slice), self.dims.image)?;
        let text_tensor = self.stack("text", text.iter().map(Vec::as_slice), self.dims.text)?;

        tracing::debug!(batch_size = batch, "Running fusion forward pass");
        self.forward(&tab_tensor, &img_tensor, &text_tensor)?
            .to_vec1::<f32>()
            .map_err(|e| PropFusionError::Model(format!("Failed to extract outputs: {e}")))
    }

    fn stack<'a>(
        &self,
        name: &str,
        rows: impl ExactSizeIterator<Item = &'a [f32]>,
        width: usize,
    ) -> Result<Tensor> {
        let batch = rows.len();
        let mut flat = Vec::with_capacity(batch * width);
        for (i, row) in rows.enumerate() {
            if row.len() != width {
                return Err(PropFusionError::Model(format!(
                    "{name} row {i} has {} values, expected {width}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        Tensor::from_vec(flat, (batch, width), &self.device)
            .map_err(|e| PropFusionError::Model(format!("Failed to create {name} tensor: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
