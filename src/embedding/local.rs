//! Local sentence-embedding models via fastembed (ONNX runtime).

use super::Embedder;
use crate::error::{HarkError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

/// Supported models: (config name, fastembed model, output dimensions).
const MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
    ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2, 384),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
];

/// Embedder backed by a pretrained model loaded once at construction.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    name: String,
    dimensions: usize,
}

impl LocalEmbedder {
    /// Load `model_name`, downloading weights into `cache_dir` on first use.
    #[instrument(skip(cache_dir))]
    pub fn new(model_name: &str, cache_dir: Option<PathBuf>, show_progress: bool) -> Result<Self> {
        let (name, model, dimensions) = MODELS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(model_name))
            .cloned()
            .ok_or_else(|| {
                HarkError::ModelUnavailable(format!(
                    "unsupported model '{}' (expected one of: {})",
                    model_name,
                    Self::supported_models().join(", ")
                ))
            })?;

        let mut opts = InitOptions::new(model).with_show_download_progress(show_progress);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(opts)
            .map_err(|e| HarkError::ModelUnavailable(format!("{}: {}", name, e)))?;

        info!("Loaded embedding model {} ({} dimensions)", name, dimensions);

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            name: name.to_string(),
            dimensions,
        })
    }

    /// Names accepted by [`LocalEmbedder::new`].
    pub fn supported_models() -> Vec<&'static str> {
        MODELS.iter().map(|(name, _, _)| *name).collect()
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        // Inference is CPU-bound; keep it off the async workers.
        let embeddings = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| HarkError::Embedding(format!("Failed to acquire lock: {}", e)))?;
            model
                .embed(vec![text], None)
                .map_err(|e| HarkError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| HarkError::Embedding(format!("Embedding task failed: {}", e)))??;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| HarkError::Embedding("model returned no embeddings".to_string()))?;

        if embedding.len() != self.dimensions {
            return Err(HarkError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        debug!("Generated {}-dimensional embedding", embedding.len());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_unavailable() {
        let err = LocalEmbedder::new("not-a-model", None, false).err().unwrap();
        assert!(matches!(err, HarkError::ModelUnavailable(_)));
        assert!(err.to_string().contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_supported_models_lists_default() {
        assert!(LocalEmbedder::supported_models().contains(&"all-MiniLM-L6-v2"));
    }
}
