//! Transformer text embedding using the Candle framework.
//!
//! [`TransformerTextEmbedder`] normalises a description with
//! [`TextNormaliser`], tokenizes it (truncated to the configured token
//! limit), runs an XLM-RoBERTa encoder and returns the L2-normalised
//! hidden state of the first token. Position ids follow the RoBERTa
//! convention of counting non-padding tokens from `pad_token_id + 1`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use propfusion_core::{PropFusionError, Result, TextEncoderConfig};
use tokenizers::{Tokenizer, TruncationParams};

use crate::embedding::EmbeddingSource;
use crate::text_normalise::TextNormaliser;

const SOURCE_NAME: &str = "text";

/// Paths of the three files an encoder checkpoint consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// `config.json`, `tokenizer.json` and `model.safetensors` inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        }
    }

    /// Resolve from the local `model_dir` if set, otherwise download from
    /// HuggingFace Hub.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] if the hub client cannot be
    /// created or a download fails.
    pub async fn resolve(config: &TextEncoderConfig) -> Result<Self> {
        if let Some(dir) = &config.model_dir {
            return Ok(Self::in_dir(dir));
        }

        use hf_hub::api::tokio::{Api, ApiBuilder};

        let api = match &config.cache_dir {
            Some(dir) => ApiBuilder::new().with_cache_dir(dir.clone()).build(),
            None => Api::new(),
        }
        .map_err(|e| PropFusionError::Config(format!("Failed to create HF API client: {e}")))?;

        let repo = api.model(config.model_id.clone());
        let mut files = Vec::with_capacity(3);
        for name in ["config.json", "tokenizer.json", "model.safetensors"] {
            let path = repo.get(name).await.map_err(|e| {
                PropFusionError::Config(format!(
                    "Failed to download {name} from {}: {e}",
                    config.model_id
                ))
            })?;
            files.push(path);
        }
        let [config, tokenizer, weights]: [PathBuf; 3] = files
            .try_into()
            .map_err(|_| PropFusionError::Config("incomplete model download".to_string()))?;
        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }
}

/// Text [`EmbeddingSource`] backed by an XLM-RoBERTa encoder.
pub struct TransformerTextEmbedder {
    normaliser: TextNormaliser,
    tokenizer: Tokenizer,
    model: XLMRobertaModel,
    device: Device,
    dimension: usize,
}

impl std::fmt::Debug for TransformerTextEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerTextEmbedder")
            .field("normaliser", &self.normaliser)
            .field("device", &self.device)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl TransformerTextEmbedder {
    /// Resolve the checkpoint and load it.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be fetched, read or parsed.
    pub async fn load(config: &TextEncoderConfig, device: &Device) -> Result<Self> {
        let normaliser = TextNormaliser::from_config(config)?;
        let files = ModelFiles::resolve(config).await?;
        Self::from_files(&files, normaliser, config.max_length, device)
    }

    /// Load an encoder from local checkpoint files.
    ///
    /// # Errors
    ///
    /// Returns [`PropFusionError::Config`] for unreadable files or an invalid
    /// config, and [`PropFusionError::Model`] if the weights do not fit.
    pub fn from_files(
        files: &ModelFiles,
        normaliser: TextNormaliser,
        max_length: usize,
        device: &Device,
    ) -> Result<Self> {
        let config_str = std::fs::read_to_string(&files.config).map_err(|e| {
            PropFusionError::Config(format!(
                "Failed to read {}: {e}",
                files.config.display()
            ))
        })?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_str).map_err(|e| {
            PropFusionError::Config(format!("Invalid encoder config: {e}"))
        })?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| PropFusionError::Config(format!("Failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| PropFusionError::Config(format!("Invalid truncation settings: {e}")))?;
        tokenizer.with_padding(None);

        // SAFETY: memory-mapping safetensors is the standard candle pattern.
        // The file is read-only and remains valid for the lifetime of VarBuilder.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights.clone()], DType::F32, device)
                .map_err(|e| PropFusionError::Model(format!("Failed to load encoder weights: {e}")))?
        };
        // Checkpoints exported from a task head nest the encoder under `roberta.`.
        let vb = if vb.contains_tensor("embeddings.word_embeddings.weight") {
            vb
        } else {
            vb.pp("roberta")
        };
        let model = XLMRobertaModel::new(&config, vb)
            .map_err(|e| PropFusionError::Model(format!("Failed to load encoder model: {e}")))?;

        tracing::info!(
            weights = %files.weights.display(),
            hidden_size = config.hidden_size,
            max_length,
            "Text encoder loaded"
        );

        Ok(Self {
            normaliser,
            tokenizer,
            model,
            device: device.clone(),
            dimension: config.hidden_size,
        })
    }

    /// Embed already-normalised encoder input.
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| PropFusionError::embedding(SOURCE_NAME, format!("Tokenization failed: {e}")))?;

        let to_tensor = |values: &[u32]| {
            Tensor::new(values, &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(|e| {
                    PropFusionError::embedding(SOURCE_NAME, format!("Tensor creation failed: {e}"))
                })
        };
        let input_ids = to_tensor(encoding.get_ids())?;
        let token_type_ids = to_tensor(encoding.get_type_ids())?;
        let attention_mask = to_tensor(encoding.get_attention_mask())?;

        let cls = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .and_then(|hidden| hidden.i((0, 0)))
            .and_then(|cls| cls.to_vec1::<f32>())
            .map_err(|e| {
                PropFusionError::embedding(SOURCE_NAME, format!("Encoder inference failed: {e}"))
            })?;
        l2_normalise(cls)
    }
}

/// Scale `vector` to unit Euclidean length.
///
/// # Errors
///
/// Returns [`PropFusionError::Embedding`] for a zero or non-finite norm.
pub fn l2_normalise(mut vector: Vec<f32>) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(PropFusionError::embedding(
            SOURCE_NAME,
            format!("cannot normalise a vector with norm {norm}"),
        ));
    }
    for v in &mut vector {
        *v /= norm;
    }
    Ok(vector)
}

#[async_trait]
impl EmbeddingSource for TransformerTextEmbedder {
    type Input = str;

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let prepared = self.normaliser.normalise(input)?;
        tracing::debug!(chars = prepared.len(), "Encoding description");
        self.encode(&prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalise() {
        let v = l2_normalise(vec![3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalise_rejects_zero_and_nan() {
        assert!(matches!(
            l2_normalise(vec![0.0; 4]),
            Err(PropFusionError::Embedding { .. })
        ));
        assert!(l2_normalise(vec![f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_model_files_in_dir() {
        let files = ModelFiles::in_dir(Path::new("/models/e5"));
        assert_eq!(files.config, PathBuf::from("/models/e5/config.json"));
        assert_eq!(files.tokenizer, PathBuf::from("/models/e5/tokenizer.json"));
        assert_eq!(files.weights, PathBuf::from("/models/e5/model.safetensors"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_local_dir() {
        let config = TextEncoderConfig {
            model_dir: Some(PathBuf::from("/models/local")),
            ..TextEncoderConfig::default()
        };
        let files = ModelFiles::resolve(&config).await.unwrap();
        assert_eq!(files, ModelFiles::in_dir(Path::new("/models/local")));
    }

    #[test]
    fn test_from_files_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let result = TransformerTextEmbedder::from_files(
            &ModelFiles::in_dir(dir.path()),
            TextNormaliser::default(),
            512,
            &Device::Cpu,
        );
        assert!(matches!(result, Err(PropFusionError::Config(_))));
    }

    #[test]
    fn test_from_files_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{\"hidden_size\": \"wide\"}").unwrap();
        let result = TransformerTextEmbedder::from_files(
            &ModelFiles::in_dir(dir.path()),
            TextNormaliser::default(),
            512,
            &Device::Cpu,
        );
        assert!(matches!(result, Err(PropFusionError::Config(_))));
    }

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"<s>": 0, "<pad>": 1, "</s>": 2, "<unk>": 3, "passage": 4, ":": 5, "rumah": 6},
            "unk_token": "<unk>"
        }
    }"#;

    fn tiny_config() -> serde_json::Value {
        serde_json::json!({
            "hidden_size": 8,
            "layer_norm_eps": 1e-5,
            "attention_probs_dropout_prob": 0.1,
            "hidden_dropout_prob": 0.1,
            "num_attention_heads": 2,
            "position_embedding_type": "absolute",
            "intermediate_size": 16,
            "hidden_act": "gelu",
            "num_hidden_layers": 1,
            "vocab_size": 8,
            "max_position_embeddings": 16,
            "type_vocab_size": 1,
            "pad_token_id": 1
        })
    }

    /// Random checkpoint whose position rows 0 and 1 are NaN. Only padding
    /// tokens may address them.
    fn write_checkpoint(dir: &Path, prefix: Option<&str>) {
        use candle_nn::VarMap;

        std::fs::write(dir.join("config.json"), tiny_config().to_string()).unwrap();
        std::fs::write(dir.join("tokenizer.json"), TOKENIZER_JSON).unwrap();

        let config: XLMRobertaConfig = serde_json::from_value(tiny_config()).unwrap();
        let varmap = VarMap::new();
        let root = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let vb = match prefix {
            Some(p) => root.pp(p),
            None => root,
        };
        XLMRobertaModel::new(&config, vb).unwrap();

        let name = match prefix {
            Some(p) => format!("{p}.embeddings.position_embeddings.weight"),
            None => "embeddings.position_embeddings.weight".to_string(),
        };
        {
            let data = varmap.data().lock().unwrap();
            let var = data.get(&name).unwrap();
            let (rows, cols) = var.as_tensor().dims2().unwrap();
            let mut values = var.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
            values[..2 * cols].fill(f32::NAN);
            var.set(&Tensor::from_vec(values, (rows, cols), &Device::Cpu).unwrap())
                .unwrap();
        }
        varmap.save(dir.join("model.safetensors")).unwrap();
    }

    #[tokio::test]
    async fn test_position_ids_start_after_padding_index() {
        for prefix in [None, Some("roberta")] {
            let dir = tempfile::tempdir().unwrap();
            write_checkpoint(dir.path(), prefix);
            let embedder = TransformerTextEmbedder::from_files(
                &ModelFiles::in_dir(dir.path()),
                TextNormaliser::default(),
                32,
                &Device::Cpu,
            )
            .unwrap();
            assert_eq!(embedder.dimension(), 8);

            let v = embedder.embed("Rumah").await.unwrap();
            assert_eq!(v.len(), 8);
            assert!(v.iter().all(|x| x.is_finite()), "prefix {prefix:?}: {v:?}");
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);

            let again = embedder.embed("rumah").await.unwrap();
            assert_eq!(v, again);
        }
    }
}
