//! Ingestion pipeline tests: sources, replacement, and id stability.

use std::sync::Arc;

use ragline_chain::Ingestor;
use ragline_chain::mock::HashEmbedder;
use ragline_core::{
    DirSource, Document, Embedder, FixedSizeChunker, Metadata, PipelineConfig, RagError,
    SentenceChunker, SourceRecord, VecSource,
};
use ragline_store::{InMemoryVectorStore, VectorStore};

const DIM: usize = 32;

fn config() -> PipelineConfig {
    PipelineConfig::builder().dimension(DIM).build().unwrap()
}

fn ingestor(config: &PipelineConfig, store: Arc<dyn VectorStore>) -> Ingestor {
    Ingestor::new(
        config,
        Arc::new(SentenceChunker::new(config.chunk_size)),
        Arc::new(HashEmbedder::new(DIM)),
        store,
    )
    .unwrap()
}

fn record(id: Option<&str>, text: &str, source: &str) -> SourceRecord {
    SourceRecord {
        id: id.map(str::to_string),
        text: text.to_string(),
        source: source.to_string(),
        metadata: Metadata::new(),
    }
}

#[tokio::test]
async fn a_source_run_reports_documents_and_chunks() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = ingestor(&config, store.clone());

    let source = VecSource::new(vec![
        record(Some("manual-id"), "The sky is blue.", "sky.txt"),
        record(None, "Water is wet.", "water.txt"),
    ]);
    let report = ingestor.ingest_source(source).await.unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(store.count().await, 2);
}

#[tokio::test]
async fn records_without_an_id_fall_back_to_their_source_reference() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = ingestor(&config, store.clone());

    let source = VecSource::new(vec![record(None, "Water is wet.", "water.txt")]);
    ingestor.ingest_source(source).await.unwrap();

    let embedder = HashEmbedder::new(DIM);
    let query = embedder.embed("water is wet").await.unwrap();
    let results = store.search(&query, 1, None).await.unwrap();
    assert_eq!(results[0].chunk.document_id, "water.txt");
}

#[tokio::test]
async fn reingesting_a_document_replaces_its_previous_chunks() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = Ingestor::new(
        &config,
        // Ten-char windows so the first text produces several chunks.
        Arc::new(FixedSizeChunker::new(10, 0)),
        Arc::new(HashEmbedder::new(DIM)),
        store.clone(),
    )
    .unwrap();

    ingestor
        .ingest_document(&Document::new("d1", "d1.txt", "abcdefghijklmnopqrstuvwxyz"))
        .await
        .unwrap();
    assert_eq!(store.count().await, 3);

    let chunks =
        ingestor.ingest_document(&Document::new("d1", "d1.txt", "short")).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn an_empty_document_clears_previous_content_and_stores_nothing() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = ingestor(&config, store.clone());

    ingestor.ingest_document(&Document::new("d1", "d1.txt", "The sky is blue.")).await.unwrap();
    assert_eq!(store.count().await, 1);

    let chunks = ingestor.ingest_document(&Document::new("d1", "d1.txt", "")).await.unwrap();
    assert!(chunks.is_empty());
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn stored_entries_carry_the_documents_source_and_metadata() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = ingestor(&config, store.clone());

    let mut metadata = Metadata::new();
    metadata.insert("author".to_string(), "jk".into());
    ingestor
        .ingest_document(
            &Document::new("d1", "docs/d1.txt", "The sky is blue.").with_metadata(metadata),
        )
        .await
        .unwrap();

    let embedder = HashEmbedder::new(DIM);
    let query = embedder.embed("the sky").await.unwrap();
    let results = store.search(&query, 1, None).await.unwrap();
    assert_eq!(results[0].metadata.get("source").unwrap().to_string(), "docs/d1.txt");
    assert_eq!(results[0].metadata.get("author").unwrap().to_string(), "jk");
}

#[tokio::test]
async fn a_directory_source_ingests_matching_files_lazily() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "The sky is blue.").unwrap();
    std::fs::write(dir.path().join("b.txt"), "Water is wet.").unwrap();
    std::fs::write(dir.path().join("ignored.md"), "# not text").unwrap();

    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let ingestor = ingestor(&config, store.clone());

    let report =
        ingestor.ingest_source(DirSource::new(dir.path(), "txt")).await.unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(store.count().await, 2);
}

#[tokio::test]
async fn a_mismatched_embedder_dimension_fails_at_construction() {
    let config = config();
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let err = Ingestor::new(
        &config,
        Arc::new(SentenceChunker::new(config.chunk_size)),
        Arc::new(HashEmbedder::new(DIM * 2)),
        store,
    )
    .unwrap_err();
    assert!(matches!(err, RagError::ConfigurationMismatch(_)));
}
