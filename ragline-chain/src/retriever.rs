//! Query-time retrieval: embed, search, threshold, deduplicate.

use std::sync::Arc;

use tracing::debug;

use ragline_core::{
    Chunk, Embedder, PipelineConfig, RagError, Result, SearchResult, retry,
};
use ragline_store::{MetadataFilter, VectorStore};

/// Per-call overrides for retrieval; unset fields fall back to the
/// pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Maximum number of results to return.
    pub top_k: Option<usize>,
    /// Minimum similarity score.
    pub min_score: Option<f32>,
    /// Exact-match metadata filter to restrict the search.
    pub filter: Option<MetadataFilter>,
}

/// Turns a query into ranked, filtered context passages.
///
/// Retrieval embeds the query, searches the vector store, drops results
/// below the score threshold, deduplicates same-document chunks whose
/// spans overlap beyond the configured fraction (keeping the
/// higher-scoring one), and truncates to `top_k`. Fewer than `top_k`
/// results is not an error, and an empty store yields an empty sequence.
pub struct Retriever {
    config: PipelineConfig,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Create a retriever over the given embedder and store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationMismatch`] when the embedder's or
    /// the store's dimension disagrees with the configuration.
    pub fn new(
        config: &PipelineConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        if embedder.dimensions() != config.dimension {
            return Err(RagError::ConfigurationMismatch(format!(
                "embedder produces {}-dimensional vectors, configuration expects {}",
                embedder.dimensions(),
                config.dimension
            )));
        }
        if store.dimension() != config.dimension {
            return Err(RagError::ConfigurationMismatch(format!(
                "vector store holds {}-dimensional vectors, configuration expects {}",
                store.dimension(),
                config.dimension
            )));
        }
        Ok(Self { config: config.clone(), embedder, store })
    }

    /// Embed the query text, applying the configured timeout and
    /// transient-failure retry to the embedder call.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let timeout = self.config.embed_timeout();
        retry(&self.config.retry, "embed", || async {
            match tokio::time::timeout(timeout, self.embedder.embed(query)).await {
                Ok(result) => result,
                Err(_) => Err(RagError::Timeout { operation: "embed", timeout }),
            }
        })
        .await
    }

    /// Search with an already-embedded query and apply the ranking
    /// policy.
    pub async fn search_embedded(
        &self,
        vector: &[f32],
        options: &RetrieveOptions,
    ) -> Result<Vec<SearchResult>> {
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let timeout = self.config.search_timeout();

        // Over-fetch so threshold and dedup drops can still fill top_k.
        let fetch_k = top_k.saturating_mul(2);
        let fetched = retry(&self.config.retry, "search", || async {
            match tokio::time::timeout(
                timeout,
                self.store.search(vector, fetch_k, options.filter.as_ref()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(RagError::Timeout { operation: "search", timeout }),
            }
        })
        .await?;

        let above_threshold: Vec<SearchResult> =
            fetched.into_iter().filter(|r| r.score >= min_score).collect();
        let mut kept = dedup_overlapping(above_threshold, self.config.dedup_overlap);
        kept.truncate(top_k);

        debug!(result_count = kept.len(), top_k, min_score, "retrieval complete");
        Ok(kept)
    }

    /// Retrieve ranked context passages for `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<SearchResult>> {
        let vector = self.embed_query(query).await?;
        self.search_embedded(&vector, options).await
    }
}

/// Fraction of the shorter chunk's span covered by the overlap with the
/// other chunk. Zero for chunks of different documents.
fn overlap_fraction(a: &Chunk, b: &Chunk) -> f32 {
    if a.document_id != b.document_id {
        return 0.0;
    }
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if end <= start {
        return 0.0;
    }
    let shorter = a.len().min(b.len()).max(1);
    (end - start) as f32 / shorter as f32
}

/// Drop results whose span overlaps an already-kept same-document result
/// beyond `max_overlap`. Results arrive ranked, so the kept one is
/// always the higher-scoring of a pair.
fn dedup_overlapping(results: Vec<SearchResult>, max_overlap: f32) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());
    for candidate in results {
        let duplicate = kept
            .iter()
            .any(|existing| overlap_fraction(&existing.chunk, &candidate.chunk) > max_overlap);
        if duplicate {
            debug!(chunk = %candidate.chunk.id, "dropping near-duplicate chunk");
        } else {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::Metadata;

    fn result(document_id: &str, index: usize, start: usize, end: usize, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk::new(document_id, index, "x".repeat(end - start), start, end),
            score,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn overlap_fraction_is_relative_to_the_shorter_span() {
        let a = Chunk::new("d", 0, "aaaaaaaaaa", 0, 100);
        let b = Chunk::new("d", 1, "bbbb", 80, 120);
        // 20 bytes shared, shorter span is 40 bytes.
        assert!((overlap_fraction(&a, &b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn chunks_of_different_documents_never_overlap() {
        let a = Chunk::new("d1", 0, "aaaa", 0, 100);
        let b = Chunk::new("d2", 0, "bbbb", 0, 100);
        assert_eq!(overlap_fraction(&a, &b), 0.0);
    }

    #[test]
    fn dedup_keeps_the_higher_scoring_of_overlapping_pairs() {
        let results = vec![
            result("d", 0, 0, 100, 0.9),
            result("d", 1, 50, 150, 0.8),
            result("d", 2, 200, 300, 0.7),
        ];
        let kept = dedup_overlapping(results, 0.4);
        let ids: Vec<&str> = kept.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["d_0", "d_2"]);
    }

    #[test]
    fn disjoint_spans_are_all_kept() {
        let results = vec![
            result("d", 0, 0, 100, 0.9),
            result("d", 1, 100, 200, 0.8),
        ];
        let kept = dedup_overlapping(results, 0.0);
        assert_eq!(kept.len(), 2);
    }
}
