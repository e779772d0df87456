//! Shared data model and capability traits for the Ragline retrieval
//! pipeline.
//!
//! This crate provides:
//! - The document/chunk/result data model and metadata scalars
//! - The [`RagError`] taxonomy and crate-wide [`Result`] alias
//! - The immutable [`PipelineConfig`] with its validating builder
//! - Chunking policies ([`FixedSizeChunker`], [`SentenceChunker`])
//! - Capability traits for pluggable backends ([`Embedder`],
//!   [`LanguageModel`], [`DataSource`])
//! - Bounded-retry ([`RetryPolicy`]) and cancellation ([`CancelToken`])
//!   primitives shared by the store and chain crates

pub mod cancel;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedder;
pub mod error;
pub mod llm;
pub mod retry;
pub mod source;

pub use cancel::CancelToken;
pub use chunking::{Chunker, FixedSizeChunker, SentenceChunker};
pub use config::{NoContextPolicy, PipelineConfig, PipelineConfigBuilder, SimilarityMetric};
pub use document::{Chunk, Conversation, Document, Metadata, Role, Scalar, SearchResult, Turn};
pub use embedder::Embedder;
pub use error::{RagError, Result};
pub use llm::{GenerateOptions, LanguageModel, TokenStream};
pub use retry::{RetryPolicy, retry};
pub use source::{DataSource, DirSource, SourceRecord, TextFileSource, VecSource};
