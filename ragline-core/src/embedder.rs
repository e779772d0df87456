//! Embedder trait for mapping text to fixed-length vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that maps text to fixed-length embedding vectors.
///
/// Implementations wrap specific backends behind a unified async
/// interface. The default [`embed_many`](Embedder::embed_many) calls
/// [`embed`](Embedder::embed) sequentially; backends with native batching
/// should override it. Transport failures are reported as
/// [`RagError::EmbedderUnavailable`](crate::RagError::EmbedderUnavailable)
/// so callers can retry them; all other failures as
/// [`RagError::EmbeddingFailed`](crate::RagError::EmbeddingFailed).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, order-preserving and of the same length
    /// as the input.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// The dimensionality of vectors produced by this embedder.
    fn dimensions(&self) -> usize;
}
