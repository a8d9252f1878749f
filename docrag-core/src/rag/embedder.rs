//! Embedding generation using model providers.
//!
//! This module converts text into vector embeddings using a fixed
//! sentence-embedding model. The same [`Embedder`] must be used to build an
//! index and to query it.

use crate::models::EmbeddingModel;
use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The API response contained no embeddings.
    #[error("No embeddings returned")]
    NoEmbeddings,

    /// The provider returned a different number of vectors than texts sent.
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// A vector's length doesn't match the model's dimension.
    ///
    /// Usually means the provider serves a different model under the configured name.
    #[error("Expected {expected}-dimensional embeddings, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using a provider's embedding model.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: EmbeddingModel,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: EmbeddingModel) -> Self {
        Self {
            provider,
            model,
            batch_size: 32,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.model.embedding_dim
    }

    /// Generates a vector embedding for a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbedderError::NoEmbeddings)
    }

    /// Embeds every text, returning vectors in input order.
    ///
    /// Texts are sent in batches of `batch_size`. Every returned vector is
    /// checked against the model dimension.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!(batch_len = batch.len(), model = %self.model.id, "Embedding batch");
            let embeddings = self.provider.embed(batch, &self.model.id).await?;

            if embeddings.is_empty() {
                return Err(EmbedderError::NoEmbeddings);
            }
            if embeddings.len() != batch.len() {
                return Err(EmbedderError::CountMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                });
            }
            if let Some(bad) = embeddings.iter().find(|v| v.len() != self.model.embedding_dim) {
                return Err(EmbedderError::DimensionMismatch {
                    expected: self.model.embedding_dim,
                    actual: bad.len(),
                });
            }

            vectors.extend(embeddings);
        }

        Ok(vectors)
    }
}
