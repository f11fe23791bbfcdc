//! Embedding collaborators: the contract the predictor consumes and the
//! file-backed image source.

use std::path::Path;

use async_trait::async_trait;
use propfusion_core::{PropFusionError, Result};

/// Produces a fixed-length vector from raw media or text.
///
/// Implementations must be deterministic for fixed weights and input, and
/// every returned vector must have exactly [`EmbeddingSource::dimension`]
/// entries.
#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    /// Raw input accepted by this source (`Path` for images, `str` for text).
    type Input: ?Sized + Sync;

    /// Short name used in error messages and logs.
    fn name(&self) -> &str;

    /// Length of every produced vector.
    fn dimension(&self) -> usize;

    /// Embed one input.
    async fn embed(&self, input: &Self::Input) -> Result<Vec<f32>>;
}

/// Check that `vector` has the length `source` declares.
///
/// # Errors
///
/// Returns [`PropFusionError::Embedding`] on a length mismatch.
pub fn check_dimension<S: EmbeddingSource + ?Sized>(source: &S, vector: &[f32]) -> Result<()> {
    if vector.len() == source.dimension() {
        Ok(())
    } else {
        Err(PropFusionError::embedding(
            source.name(),
            format!(
                "produced {} values, expected {}",
                vector.len(),
                source.dimension()
            ),
        ))
    }
}

// ---------------------------------------------------------------------------
// SafetensorsEmbeddingSource
// ---------------------------------------------------------------------------

/// Name of the tensor holding the precomputed vector.
pub const EMBEDDING_TENSOR: &str = "embedding";

/// Reads vectors precomputed by an external encoder from safetensors files.
///
/// Each file holds an `f32` tensor named `embedding` of shape `[D]` or `[1, D]`.
#[derive(Debug, Clone)]
pub struct SafetensorsEmbeddingSource {
    name: String,
    dimension: usize,
}

impl SafetensorsEmbeddingSource {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<f32>> {
        let data = std::fs::read(path)
            .map_err(|e| self.error(format!("Failed to read {}: {e}", path.display())))?;
        let tensors = safetensors::SafeTensors::deserialize(&data)
            .map_err(|e| self.error(format!("Failed to parse {}: {e}", path.display())))?;
        let view = tensors.tensor(EMBEDDING_TENSOR).map_err(|e| {
            self.error(format!(
                "Tensor '{EMBEDDING_TENSOR}' not found in {}: {e}",
                path.display()
            ))
        })?;

        if view.dtype() != safetensors::Dtype::F32 {
            return Err(self.error(format!(
                "Tensor '{EMBEDDING_TENSOR}' in {} has dtype {:?}, expected F32",
                path.display(),
                view.dtype()
            )));
        }
        let width = match view.shape() {
            [d] | [1, d] => *d,
            other => {
                return Err(self.error(format!(
                    "Tensor '{EMBEDDING_TENSOR}' in {} has shape {other:?}, expected [D] or [1, D]",
                    path.display()
                )))
            }
        };
        if width != self.dimension {
            return Err(self.error(format!(
                "{} holds {width} values, expected {}",
                path.display(),
                self.dimension
            )));
        }

        Ok(view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn error(&self, message: String) -> PropFusionError {
        PropFusionError::embedding(&self.name, message)
    }
}

#[async_trait]
impl EmbeddingSource for SafetensorsEmbeddingSource {
    type Input = Path;

    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, input: &Path) -> Result<Vec<f32>> {
        let path = input.to_path_buf();
        let source = self.clone();
        let vector = tokio::task::spawn_blocking(move || source.read(&path))
            .await
            .map_err(|e| self.error(format!("Embedding task failed: {e}")))??;
        tracing::debug!(source = %self.name, path = %input.display(), "Image embedding loaded");
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_vector(dir: &Path, file: &str, name: &str, values: &[f32], shape: &[usize]) -> std::path::PathBuf {
        let bytes: Vec<u8> = values.iter().flat_map(|f| f.to_le_bytes()).collect();
        let mut tensors = HashMap::new();
        tensors.insert(
            name.to_string(),
            safetensors::tensor::TensorView::new(safetensors::Dtype::F32, shape.to_vec(), &bytes)
                .unwrap(),
        );
        let serialized = safetensors::tensor::serialize(&tensors, &None).unwrap();
        let path = dir.join(file);
        std::fs::write(&path, serialized).unwrap();
        path
    }

    #[tokio::test]
    async fn test_reads_flat_and_batched_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let source = SafetensorsEmbeddingSource::new("image", 3);

        let flat = write_vector(dir.path(), "a.safetensors", EMBEDDING_TENSOR, &[0.5, -1.0, 2.0], &[3]);
        assert_eq!(source.embed(&flat).await.unwrap(), vec![0.5, -1.0, 2.0]);

        let batched = write_vector(dir.path(), "b.safetensors", EMBEDDING_TENSOR, &[1.0, 2.0, 3.0], &[1, 3]);
        assert_eq!(source.embed(&batched).await.unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_embedding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vector(dir.path(), "v.safetensors", EMBEDDING_TENSOR, &[1.0, 2.0], &[2]);
        let err = SafetensorsEmbeddingSource::new("image", 3)
            .embed(&path)
            .await
            .unwrap_err();
        match err {
            PropFusionError::Embedding { source_name, .. } => assert_eq!(source_name, "image"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_tensor_and_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = SafetensorsEmbeddingSource::new("image", 2);

        let wrong_name = write_vector(dir.path(), "w.safetensors", "features", &[1.0, 2.0], &[2]);
        assert!(matches!(
            source.embed(&wrong_name).await,
            Err(PropFusionError::Embedding { .. })
        ));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"\xff\xd8\xff not a tensor file").unwrap();
        assert!(matches!(
            source.embed(&garbage).await,
            Err(PropFusionError::Embedding { .. })
        ));

        assert!(source.embed(Path::new("/nonexistent/x.safetensors")).await.is_err());
    }

    #[test]
    fn test_check_dimension() {
        let source = SafetensorsEmbeddingSource::new("text", 4);
        assert!(check_dimension(&source, &[0.0; 4]).is_ok());
        assert!(check_dimension(&source, &[0.0; 5]).is_err());
    }
}
