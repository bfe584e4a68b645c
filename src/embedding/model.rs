//! Local embedding model implementation using candle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::embedding::candle_backend::{download_model, select_device, BertEmbedder};
use crate::embedding::Embedder;
use crate::error::SchemaMindError;

/// Configuration for embedding model initialization.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// HuggingFace repo ID (e.g. "BAAI/bge-small-en-v1.5")
    pub model_repo: String,
    /// Embedding dimensions (e.g. 384 for BGE-small)
    pub dimensions: usize,
    /// Short model identifier (e.g. "bge-small-en-v1.5")
    pub model_id: String,
    /// Optional cache directory for model files
    pub cache_dir: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_repo: "BAAI/bge-small-en-v1.5".to_string(),
            dimensions: 384,
            model_id: "bge-small-en-v1.5".to_string(),
            cache_dir: None,
        }
    }
}

/// Local embedding service backed by candle.
///
/// Downloads and loads the model eagerly at construction time; if that
/// fails (no network on first run, unsupported device), the service reports
/// `is_available() == false` rather than erroring.
pub struct LocalEmbeddingService {
    embedder: Option<Arc<BertEmbedder>>,
    available: bool,
    dimensions: usize,
    model_id: String,
}

impl LocalEmbeddingService {
    /// Construct a service, downloading and loading the model synchronously.
    ///
    /// Intended to be called from a blocking context (`spawn_blocking`) during
    /// app startup, since both the download and the model load are blocking
    /// I/O and CPU work.
    pub fn new(config: EmbeddingConfig) -> Result<Self, SchemaMindError> {
        let dimensions = config.dimensions;
        let model_id = config.model_id.clone();

        let files = match download_model(
            &config.model_repo,
            config.cache_dir.as_deref().map(std::path::Path::new),
        ) {
            Ok(files) => files,
            Err(e) => {
                warn!(
                    "Failed to download embedding model: {}. Embedding service will be unavailable.",
                    e
                );
                return Ok(Self {
                    embedder: None,
                    available: false,
                    dimensions,
                    model_id,
                });
            }
        };

        let device = select_device();

        match BertEmbedder::new(&files, device) {
            Ok(embedder) => {
                let dimensions = embedder.dimensions();
                Ok(Self {
                    embedder: Some(Arc::new(embedder)),
                    available: true,
                    dimensions,
                    model_id,
                })
            }
            Err(e) => {
                warn!(
                    "Failed to load embedding model: {}. Embedding service will be unavailable.",
                    e
                );
                Ok(Self {
                    embedder: None,
                    available: false,
                    dimensions,
                    model_id,
                })
            }
        }
    }
}

#[async_trait]
impl Embedder for LocalEmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, SchemaMindError> {
        let mut out = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        out.pop()
            .ok_or_else(|| SchemaMindError::EmbeddingUnavailable("no embedding returned".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SchemaMindError> {
        if !self.available {
            return Err(SchemaMindError::EmbeddingUnavailable(
                "embedding model is not available".to_string(),
            ));
        }

        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| SchemaMindError::EmbeddingUnavailable("model not loaded".into()))?
            .clone();
        let texts = texts.to_vec();

        let result = tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| SchemaMindError::Other(anyhow::anyhow!("embedding task join error: {e}")))?
            .map_err(|e| SchemaMindError::Other(anyhow::anyhow!("embedding failed: {e}")))?;

        Ok(result)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
