//! Pipeline configuration.
//!
//! One immutable [`PipelineConfig`] is constructed at startup through the
//! validating [`PipelineConfigBuilder`] and passed by reference into each
//! component's constructor. Components copy what they need; there is no
//! ambient global configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// The similarity metric a vector store ranks by.
///
/// The metric is a store-wide configuration, not a per-query choice.
/// Higher scores are always more relevant:
///
/// - `Cosine` — normalized dot product in `[-1, 1]`.
/// - `DotProduct` — raw dot product. Reflexivity (a vector being its own
///   best match) only holds when embeddings are normalized; embedders
///   that do not normalize should be paired with `Cosine`.
/// - `Euclidean` — distance mapped to `(0, 1]` via `1 / (1 + d)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Normalized dot product.
    #[default]
    Cosine,
    /// Raw dot product.
    DotProduct,
    /// Inverted Euclidean distance.
    Euclidean,
}

impl SimilarityMetric {
    /// The snake_case wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::DotProduct => "dot_product",
            SimilarityMetric::Euclidean => "euclidean",
        }
    }
}

/// What the chain does when retrieval yields zero passages.
///
/// Either way the path taken is explicit: ungrounded answers carry
/// `grounded == false`, and refusal surfaces [`RagError::NoContext`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoContextPolicy {
    /// Proceed to generation with a fallback context line.
    #[default]
    Ungrounded,
    /// Fail the request with [`RagError::NoContext`].
    Refuse,
}

/// Configuration for the full retrieval pipeline.
///
/// Durations are stored as millisecond fields to keep the config
/// serde-friendly; use the accessor methods to get [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Embedding dimension every vector in the pipeline must have.
    pub dimension: usize,
    /// Store-wide similarity metric.
    pub metric: SimilarityMetric,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap window between consecutive fixed-size chunks, in characters.
    pub chunk_overlap: usize,
    /// Number of top results to request from vector search.
    pub top_k: usize,
    /// Minimum similarity score; results below it are filtered out.
    pub min_score: f32,
    /// Same-document chunks whose span overlap fraction exceeds this are
    /// deduplicated, keeping the higher-scoring chunk.
    pub dedup_overlap: f32,
    /// Character budget for retrieved context during prompt assembly.
    pub max_context_chars: usize,
    /// Hard ceiling on assembled prompt size in characters; exceeding it
    /// after context truncation fails with [`RagError::PromptTooLarge`].
    pub max_prompt_chars: usize,
    /// Policy for queries that retrieve zero passages.
    pub no_context_policy: NoContextPolicy,
    /// Time budget for one embedding call, in milliseconds.
    pub embed_timeout_ms: u64,
    /// Time budget for one vector search, in milliseconds.
    pub search_timeout_ms: u64,
    /// Time budget for one generation call, in milliseconds.
    pub generate_timeout_ms: u64,
    /// Bounded exponential backoff applied to transient collaborator failures.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dimension: 1536,
            metric: SimilarityMetric::Cosine,
            chunk_size: 512,
            chunk_overlap: 100,
            top_k: 10,
            min_score: 0.0,
            dedup_overlap: 0.5,
            max_context_chars: 6000,
            max_prompt_chars: 16_000,
            no_context_policy: NoContextPolicy::Ungrounded,
            embed_timeout_ms: 10_000,
            search_timeout_ms: 5_000,
            generate_timeout_ms: 60_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for constructing a [`PipelineConfig`].
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Time budget for one embedding call.
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    /// Time budget for one vector search.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Time budget for one generation call.
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }
}

/// Builder for constructing a validated [`PipelineConfig`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the embedding dimension.
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Set the store-wide similarity metric.
    pub fn metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to request from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score for retrieved results.
    pub fn min_score(mut self, score: f32) -> Self {
        self.config.min_score = score;
        self
    }

    /// Set the span overlap fraction above which same-document chunks
    /// are deduplicated.
    pub fn dedup_overlap(mut self, fraction: f32) -> Self {
        self.config.dedup_overlap = fraction;
        self
    }

    /// Set the character budget for retrieved context.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the hard ceiling on assembled prompt size in characters.
    pub fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    /// Set the zero-passage policy.
    pub fn no_context_policy(mut self, policy: NoContextPolicy) -> Self {
        self.config.no_context_policy = policy;
        self
    }

    /// Set the embedding call time budget.
    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.config.embed_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the vector search time budget.
    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.config.search_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the generation call time budget.
    pub fn generate_timeout(mut self, timeout: Duration) -> Self {
        self.config.generate_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry policy for transient collaborator failures.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build the [`PipelineConfig`], validating that parameters are
    /// consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `dimension == 0` or `top_k == 0` or `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `dedup_overlap` is outside `[0, 1]`
    /// - `max_context_chars > max_prompt_chars`
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.config;
        if config.dimension == 0 {
            return Err(RagError::Config("dimension must be greater than zero".to_string()));
        }
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&config.dedup_overlap) {
            return Err(RagError::Config(format!(
                "dedup_overlap ({}) must be within [0, 1]",
                config.dedup_overlap
            )));
        }
        if config.max_context_chars > config.max_prompt_chars {
            return Err(RagError::Config(format!(
                "max_context_chars ({}) must not exceed max_prompt_chars ({})",
                config.max_context_chars, config.max_prompt_chars
            )));
        }
        Ok(config)
    }
}
