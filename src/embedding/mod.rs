//! The Embedder component: a black-box encoder producing
//! fixed-dimension float32 vectors for table and column summaries, used by
//! both the Semantic Index and the Retrieval Engine's embedding strategies.

pub mod candle_backend;
pub mod index;
pub mod lexicon;
pub mod model;

use async_trait::async_trait;

use crate::error::SchemaMindError;

pub use index::SemanticIndex;
pub use lexicon::TokenLexicon;
pub use model::{EmbeddingConfig, LocalEmbeddingService};

/// No-op embedder used when the local model cannot be loaded.
///
/// Reports `is_available() == false` so callers degrade to lexical-only
/// retrieval instead of failing outright.
pub struct NoopEmbedder {
    dimensions: usize,
}

impl NoopEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl Embedder for NoopEmbedder {
    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, SchemaMindError> {
        Err(SchemaMindError::EmbeddingUnavailable(
            "embedding model is not available".to_string(),
        ))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, SchemaMindError> {
        Err(SchemaMindError::EmbeddingUnavailable(
            "embedding model is not available".to_string(),
        ))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        false
    }

    fn model_id(&self) -> &str {
        "noop"
    }
}

/// Encodes text into fixed-dimension vectors.
///
/// Swappable so the service degrades gracefully rather than failing init
/// when no local model is present.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single piece of text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, SchemaMindError>;

    /// Embed a batch of texts in one pass — preferred over repeated
    /// `embed_text` calls during index builds.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SchemaMindError>;

    /// Output vector dimensionality.
    fn dimensions(&self) -> usize;

    /// Whether the underlying model loaded successfully.
    fn is_available(&self) -> bool;

    /// Short model identifier surfaced in `get_init_status`.
    fn model_id(&self) -> &str;
}
