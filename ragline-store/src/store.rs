//! Vector store trait for storing and searching embedding vectors.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragline_core::{Chunk, Metadata, Result, Scalar, SearchResult, SimilarityMetric};

/// The tuple a vector store persists per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub vector: Vec<f32>,
    /// Metadata stored alongside the chunk (typically inherited from the
    /// parent document).
    pub metadata: Metadata,
}

/// An exact-match predicate over metadata key-value pairs.
///
/// An entry matches when every pair in the filter is present in the
/// entry's metadata with an equal value.
pub type MetadataFilter = HashMap<String, Scalar>;

/// A storage backend for embedding vectors with similarity search.
///
/// Stores are configured with a fixed embedding dimension and a
/// store-wide [`SimilarityMetric`]; every vector passing through the
/// store must match the dimension. Mutation must be safe under
/// concurrent callers, and a `search` must never observe a partially
/// written entry.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the entry for `chunk.id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`](ragline_core::RagError::DimensionMismatch)
    /// when `vector` does not have the store's dimension; the store is
    /// left unchanged.
    async fn upsert(&self, chunk: Chunk, vector: Vec<f32>, metadata: Metadata) -> Result<()>;

    /// Remove all chunks belonging to `document_id`.
    ///
    /// A no-op (not an error) when the document is absent.
    async fn delete(&self, document_id: &str) -> Result<()>;

    /// Return up to `k` entries ranked by the configured metric,
    /// restricted to entries matching `filter` when one is given.
    ///
    /// Results are ordered by descending score; equal scores are ordered
    /// by ascending chunk id for determinism.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidK`](ragline_core::RagError::InvalidK)
    /// when `k == 0`, and
    /// [`RagError::DimensionMismatch`](ragline_core::RagError::DimensionMismatch)
    /// when the query vector does not have the store's dimension.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of entries currently stored.
    async fn count(&self) -> usize;

    /// The embedding dimension the store was configured with.
    fn dimension(&self) -> usize;

    /// The similarity metric the store ranks by.
    fn metric(&self) -> SimilarityMetric;
}
