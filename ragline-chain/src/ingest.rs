//! Ingestion: data source → chunk → embed → store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use ragline_core::{
    Chunk, Chunker, DataSource, Document, Embedder, PipelineConfig, RagError, Result, Scalar,
    retry,
};
use ragline_store::VectorStore;

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents processed.
    pub documents: usize,
    /// Chunks written to the store.
    pub chunks: usize,
}

/// Runs documents through chunk → embed → upsert.
///
/// Re-ingesting a document id replaces it: embedding happens first, then
/// the document's previous chunks are deleted and the new entries
/// inserted, so a failed embedding leaves the store unchanged.
pub struct Ingestor {
    config: PipelineConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create an ingestor over the given chunker, embedder, and store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationMismatch`] when the embedder's
    /// or the store's dimension disagrees with the configuration.
    pub fn new(
        config: &PipelineConfig,
        chunker: Arc<dyn Chunker>,
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
        Ok(Self { config: config.clone(), chunker, embedder, store })
    }

    /// Ingest one document, returning the chunks written.
    ///
    /// An empty document deletes any previously stored chunks for the
    /// id and stores nothing.
    pub async fn ingest_document(&self, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            self.store.delete(&document.id).await?;
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let timeout = self.config.embed_timeout();
        let vectors = retry(&self.config.retry, "embed", || async {
            match tokio::time::timeout(timeout, self.embedder.embed_many(&texts)).await {
                Ok(result) => result,
                Err(_) => Err(RagError::Timeout { operation: "embed", timeout }),
            }
        })
        .await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingFailed(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        // Replace, never mutate: the previous generation of this
        // document's chunks goes away before the new one lands.
        self.store.delete(&document.id).await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let mut metadata = document.metadata.clone();
            metadata.insert("source".to_string(), Scalar::from(document.source.clone()));
            self.store.upsert(chunk.clone(), vector, metadata).await?;
        }

        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(chunks)
    }

    /// Drain a data source through the ingestion pipeline.
    ///
    /// Records without an id fall back to their source reference, which
    /// is stable across re-ingestion of the same origin.
    pub async fn ingest_source<S: DataSource>(&self, source: S) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for record in source.records()? {
            let record = record?;
            let id = record.id.unwrap_or_else(|| record.source.clone());
            let document = Document {
                id,
                source: record.source,
                text: record.text,
                metadata: record.metadata,
                ingested_at: Utc::now(),
            };
            report.chunks += self.ingest_document(&document).await?.len();
            report.documents += 1;
        }
        info!(
            documents = report.documents,
            chunks = report.chunks,
            "ingestion run complete"
        );
        Ok(report)
    }
}
