//! Text embedding collaborator.
//!
//! Strategies only see the `EmbeddingProvider` trait; `OllamaEmbedding` is the
//! HTTP implementation used by the binary.

mod ollama;

pub use ollama::{OllamaConfig, OllamaEmbedding};

use async_trait::async_trait;

/// Errors that can occur during embedding operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    /// The service returned a different number of vectors than texts sent.
    #[error("embedding count mismatch: sent {expected} texts, got {actual} vectors")]
    CountMismatch { expected: usize, actual: usize },
    #[error("invalid embedding configuration: {0}")]
    Config(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Produces vector embeddings for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// Embed many texts; output order matches input order.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}

/// `embed_batch` with the one-vector-per-text contract enforced, so callers
/// can zip the output with their inputs.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let vectors = provider.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }
    Ok(vectors)
}
