//! Embedding generation for semantic search.

mod hash;
#[cfg(feature = "local-model")]
mod local;

pub use hash::HashEmbedder;
#[cfg(feature = "local-model")]
pub use local::LocalEmbedder;

use crate::config::{EmbeddingProvider, Settings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

/// Build the embedder selected in `settings`.
///
/// Model weights are loaded here, once; failures surface as
/// [`HarkError::ModelUnavailable`](crate::error::HarkError::ModelUnavailable).
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    match settings.embedding.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(
            settings.embedding.dimensions,
        )?)),
        #[cfg(feature = "local-model")]
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedder::new(
            &settings.embedding.model,
            settings.model_cache_dir(),
            settings.embedding.show_download_progress,
        )?)),
        #[cfg(not(feature = "local-model"))]
        EmbeddingProvider::Local => Err(crate::error::HarkError::ModelUnavailable(format!(
            "{} requires the `local-model` feature",
            settings.embedding.model
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarkError;

    #[test]
    fn test_from_settings_hash() {
        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProvider::Hash;
        settings.embedding.dimensions = 32;

        let embedder = from_settings(&settings).unwrap();
        assert_eq!(embedder.dimensions(), 32);
    }

    #[test]
    fn test_from_settings_rejects_zero_dimensions() {
        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProvider::Hash;
        settings.embedding.dimensions = 0;

        assert!(matches!(
            from_settings(&settings),
            Err(HarkError::InvalidArgument(_))
        ));
    }
}
