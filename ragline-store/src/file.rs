//! File-backed vector store with a versioned snapshot header.
//!
//! [`FileVectorStore`] layers durability over the exact in-memory scan:
//! the whole index is one JSON snapshot holding a header (format
//! version, embedding dimension, similarity metric) followed by the
//! entries. Opening a snapshot whose header disagrees with the pipeline
//! configuration fails fast with `ConfigurationMismatch` instead of
//! returning scores computed against the wrong embedding space.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ragline_core::{
    Chunk, Metadata, PipelineConfig, RagError, Result, SearchResult, SimilarityMetric,
};

use crate::memory::InMemoryVectorStore;
use crate::store::{IndexEntry, MetadataFilter, VectorStore};

/// Current snapshot format version.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoreHeader {
    format_version: u32,
    dimension: usize,
    metric: SimilarityMetric,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    header: StoreHeader,
    entries: Vec<IndexEntry>,
}

/// A persistent [`VectorStore`] snapshotting to a single JSON file.
///
/// Every mutation is written through: the snapshot is serialized to a
/// temporary file and atomically renamed over the target, so a reader
/// of the file never observes a partial write. Search runs against the
/// in-memory copy and has the same contract and determinism as
/// [`InMemoryVectorStore`].
///
/// Suited to the small corpora the exact scan targets; the full index
/// is rewritten per mutation.
#[derive(Debug)]
pub struct FileVectorStore {
    path: PathBuf,
    memory: InMemoryVectorStore,
}

impl FileVectorStore {
    /// Open the snapshot at `path`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigurationMismatch`] when an existing
    /// snapshot's format version, dimension, or metric disagree with
    /// `config`, and [`RagError::Store`] when the file cannot be read
    /// or parsed.
    pub async fn open(path: impl Into<PathBuf>, config: &PipelineConfig) -> Result<Self> {
        let path = path.into();
        let memory = InMemoryVectorStore::new(config);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    RagError::Store(format!(
                        "failed to parse snapshot {}: {e}",
                        path.display()
                    ))
                })?;
                check_header(&snapshot.header, config, &path)?;
                let entry_count = snapshot.entries.len();
                for entry in snapshot.entries {
                    memory.upsert(entry.chunk, entry.vector, entry.metadata).await?;
                }
                info!(path = %path.display(), entry_count, "loaded vector store snapshot");
                Ok(Self { path, memory })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let store = Self { path, memory };
                // Write the header immediately so the configuration is
                // pinned from the moment the store exists.
                store.flush().await?;
                debug!(path = %store.path.display(), "created empty vector store snapshot");
                Ok(store)
            }
            Err(e) => Err(RagError::Store(format!(
                "failed to read snapshot {}: {e}",
                path.display()
            ))),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the current state to the snapshot file.
    async fn flush(&self) -> Result<()> {
        let snapshot = Snapshot {
            header: StoreHeader {
                format_version: FORMAT_VERSION,
                dimension: self.memory.dimension(),
                metric: self.memory.metric(),
            },
            entries: self.memory.entries().await,
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| RagError::Store(format!("failed to serialize snapshot: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            RagError::Store(format!("failed to write snapshot {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            RagError::Store(format!(
                "failed to replace snapshot {}: {e}",
                self.path.display()
            ))
        })?;
        debug!(path = %self.path.display(), "flushed vector store snapshot");
        Ok(())
    }
}

fn check_header(header: &StoreHeader, config: &PipelineConfig, path: &Path) -> Result<()> {
    if header.format_version != FORMAT_VERSION {
        return Err(RagError::ConfigurationMismatch(format!(
            "snapshot {} has format version {}, this build reads version {FORMAT_VERSION}",
            path.display(),
            header.format_version
        )));
    }
    if header.dimension != config.dimension {
        return Err(RagError::ConfigurationMismatch(format!(
            "snapshot {} was written with dimension {}, configuration expects {}",
            path.display(),
            header.dimension,
            config.dimension
        )));
    }
    if header.metric != config.metric {
        return Err(RagError::ConfigurationMismatch(format!(
            "snapshot {} was written with metric {}, configuration expects {}",
            path.display(),
            header.metric.as_str(),
            config.metric.as_str()
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn upsert(&self, chunk: Chunk, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        self.memory.upsert(chunk, vector, metadata).await?;
        self.flush().await
    }

    async fn delete(&self, document_id: &str) -> Result<()> {
        self.memory.delete(document_id).await?;
        self.flush().await
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        self.memory.search(query, k, filter).await
    }

    async fn count(&self) -> usize {
        self.memory.count().await
    }

    fn dimension(&self) -> usize {
        self.memory.dimension()
    }

    fn metric(&self) -> SimilarityMetric {
        self.memory.metric()
    }
}
