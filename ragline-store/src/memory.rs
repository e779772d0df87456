//! In-memory vector store with exact brute-force search.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use ragline_core::{
    Chunk, Metadata, PipelineConfig, RagError, Result, SearchResult, SimilarityMetric,
};

use crate::metric::score;
use crate::store::{IndexEntry, MetadataFilter, VectorStore};

/// An in-memory vector store scanning every entry exactly.
///
/// This is the reference implementation: search visits each entry,
/// scores it under the configured metric, and ranks deterministically
/// (descending score, ties by ascending chunk id).
///
/// Entries live in a `tokio::sync::RwLock`-protected map, which makes
/// the store linearizable within the process: `upsert`/`delete` hold the
/// write lock, so a concurrent `search` observes either all of an entry
/// or none of it, never a partial write. Reads block on writes only for
/// the duration of the map update itself.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: SimilarityMetric,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Chunk id → stored entry.
    entries: HashMap<String, IndexEntry>,
    /// Document id → chunk ids, for `delete(document_id)`.
    by_document: HashMap<String, Vec<String>>,
}

impl InMemoryVectorStore {
    /// Create an empty store with the configuration's dimension and
    /// metric.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            dimension: config.dimension,
            metric: config.metric,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// All entries, ordered by chunk id.
    ///
    /// Used by persistent stores to snapshot their state.
    pub async fn entries(&self) -> Vec<IndexEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<IndexEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
        entries
    }
}

/// Whether `metadata` satisfies every pair of `filter`.
fn matches_filter(metadata: &Metadata, filter: &MetadataFilter) -> bool {
    filter.iter().all(|(key, value)| metadata.get(key) == Some(value))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunk: Chunk, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut inner = self.inner.write().await;
        // Replacing a chunk that moved between documents must not leave
        // a stale id under the old document.
        let moved_from = inner.entries.get(&chunk.id).and_then(|previous| {
            (previous.chunk.document_id != chunk.document_id)
                .then(|| previous.chunk.document_id.clone())
        });
        if let Some(old_document) = moved_from {
            let emptied = inner.by_document.get_mut(&old_document).map(|ids| {
                ids.retain(|id| *id != chunk.id);
                ids.is_empty()
            });
            if emptied == Some(true) {
                inner.by_document.remove(&old_document);
            }
        }

        let ids = inner.by_document.entry(chunk.document_id.clone()).or_default();
        if !ids.contains(&chunk.id) {
            ids.push(chunk.id.clone());
        }
        inner.entries.insert(chunk.id.clone(), IndexEntry { chunk, vector, metadata });
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(ids) = inner.by_document.remove(document_id) {
            for id in ids {
                inner.entries.remove(&id);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidK(k));
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<SearchResult> = inner
            .entries
            .values()
            .filter(|entry| filter.is_none_or(|f| matches_filter(&entry.metadata, f)))
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: score(self.metric, query, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }
}
