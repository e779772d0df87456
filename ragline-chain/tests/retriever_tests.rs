//! Retrieval policy tests: thresholds, dedup, and transport failure
//! handling.

use std::sync::Arc;

use ragline_chain::mock::{HashEmbedder, UnreliableEmbedder};
use ragline_chain::{RetrieveOptions, Retriever};
use ragline_core::{Chunk, Embedder, Metadata, PipelineConfig, RagError, RetryPolicy};
use ragline_store::{InMemoryVectorStore, VectorStore};

const DIM: usize = 64;

fn config() -> PipelineConfig {
    PipelineConfig::builder().dimension(DIM).build().unwrap()
}

async fn store_text(
    store: &InMemoryVectorStore,
    embedder: &HashEmbedder,
    document_id: &str,
    index: usize,
    text: &str,
    start: usize,
    end: usize,
) {
    let vector = embedder.embed(text).await.unwrap();
    store
        .upsert(Chunk::new(document_id, index, text, start, end), vector, Metadata::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn an_empty_store_yields_an_empty_sequence_not_an_error() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let results =
        retriever.retrieve("anything at all", &RetrieveOptions::default()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn results_below_the_score_threshold_are_dropped() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    store_text(&store, &embedder, "related", 0, "The sky is blue.", 0, 16).await;
    store_text(&store, &embedder, "unrelated", 0, "Bananas are yellow.", 0, 19).await;
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let options = RetrieveOptions { min_score: Some(0.3), ..Default::default() };
    let results = retriever.retrieve("What color is the sky?", &options).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.document_id, "related");
    assert!(results[0].score >= 0.3);
}

#[tokio::test]
async fn fewer_results_than_top_k_is_not_an_error() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    store_text(&store, &embedder, "only", 0, "The sky is blue.", 0, 16).await;
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let options = RetrieveOptions { top_k: Some(10), ..Default::default() };
    let results = retriever.retrieve("the sky", &options).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn retrieval_never_exceeds_top_k() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    for i in 0..6 {
        store_text(&store, &embedder, &format!("d{i}"), 0, "the sky is blue", 0, 15).await;
    }
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let options = RetrieveOptions { top_k: Some(2), ..Default::default() };
    let results = retriever.retrieve("the sky", &options).await.unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn overlap_at_exactly_the_configured_fraction_survives() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    // Two chunks of the same document overlapping exactly 50% (the
    // default dedup_overlap), and a chunk of another document.
    store_text(&store, &embedder, "d1", 0, "the sky is blue", 0, 100).await;
    store_text(&store, &embedder, "d1", 1, "the sky is blue", 50, 150).await;
    store_text(&store, &embedder, "d2", 0, "the sky is blue", 0, 100).await;
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let results = retriever.retrieve("the sky is blue", &RetrieveOptions::default()).await.unwrap();

    // Dedup drops only overlap strictly beyond the fraction.
    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert!(ids.contains(&"d1_0"));
    assert!(ids.contains(&"d1_1"));
    assert!(ids.contains(&"d2_0"));
}

#[tokio::test]
async fn overlap_beyond_the_configured_fraction_keeps_the_higher_scoring_chunk() {
    let config = PipelineConfig::builder().dimension(DIM).dedup_overlap(0.3).build().unwrap();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    store_text(&store, &embedder, "d1", 0, "the sky is blue", 0, 100).await;
    store_text(&store, &embedder, "d1", 1, "the sky is blue", 50, 150).await;
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let results = retriever.retrieve("the sky is blue", &RetrieveOptions::default()).await.unwrap();

    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, ["d1_0"]);
}

#[tokio::test(start_paused = true)]
async fn a_transient_embedder_failure_is_retried_to_success() {
    let config = config();
    let embedder = Arc::new(UnreliableEmbedder::new(DIM, 1));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let results = retriever.retrieve("anything", &RetrieveOptions::default()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn a_persistent_transport_failure_keeps_its_error_kind() {
    let config = PipelineConfig::builder()
        .dimension(DIM)
        .retry(RetryPolicy { max_retries: 2, ..RetryPolicy::default() })
        .build()
        .unwrap();
    let embedder = Arc::new(UnreliableEmbedder::new(DIM, usize::MAX));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let err = retriever.retrieve("anything", &RetrieveOptions::default()).await.unwrap_err();
    assert!(matches!(err, RagError::EmbedderUnavailable(_)));
}

#[tokio::test]
async fn a_zero_top_k_override_is_rejected() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let retriever = Retriever::new(&config, embedder, store).unwrap();

    let options = RetrieveOptions { top_k: Some(0), ..Default::default() };
    let err = retriever.retrieve("anything", &options).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidK(0)));
}

#[tokio::test]
async fn a_mismatched_embedder_dimension_fails_at_construction() {
    let config = config();
    let embedder = Arc::new(HashEmbedder::new(DIM * 2));
    let store = Arc::new(InMemoryVectorStore::new(&config));
    let err = Retriever::new(&config, embedder, store).unwrap_err();
    assert!(matches!(err, RagError::ConfigurationMismatch(_)));
}
