//! Retriever and chain orchestration for the Ragline retrieval
//! pipeline.
//!
//! This crate wires the shared data model and the vector store into one
//! request/response cycle:
//!
//! - [`Retriever`] — embed a query, search the store, apply the
//!   threshold/dedup ranking policy
//! - [`PromptTemplate`] — assemble the final prompt under a context
//!   budget, dropping the lowest-scoring passages first
//! - [`RagChain`] — the stage machine sequencing embedding, retrieval,
//!   prompt assembly, and generation, with per-call timeouts, bounded
//!   retries, streaming, and cancellation
//! - [`Ingestor`] — drain data sources through chunk → embed → upsert
//! - [`mock`] — deterministic in-process backends for tests
//! - OpenAI-backed clients behind the `openai` feature
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragline_chain::{RagChain, AskOptions, Reply, mock::{HashEmbedder, StaticModel}};
//! use ragline_core::{Conversation, PipelineConfig};
//! use ragline_store::InMemoryVectorStore;
//!
//! let config = PipelineConfig::builder().dimension(64).build()?;
//! let store = Arc::new(InMemoryVectorStore::new(&config));
//! let chain = RagChain::builder()
//!     .config(config)
//!     .embedder(Arc::new(HashEmbedder::new(64)))
//!     .store(store)
//!     .model(Arc::new(StaticModel::new("The sky is blue.")))
//!     .build()?;
//!
//! match chain.ask("What color is the sky?", &Conversation::new(), AskOptions::default()).await? {
//!     Reply::Answer(answer) => println!("{}", answer.text),
//!     Reply::Stream(_) => unreachable!("streaming was not requested"),
//! }
//! ```

pub mod chain;
pub mod ingest;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
pub mod retriever;

pub use chain::{Answer, AnswerStream, AskOptions, ChainError, RagChain, RagChainBuilder, Reply, Stage};
pub use ingest::{IngestReport, Ingestor};
#[cfg(feature = "openai")]
pub use openai::{OpenAiChatModel, OpenAiEmbedder};
pub use prompt::{AssembledPrompt, PromptTemplate};
pub use retriever::{RetrieveOptions, Retriever};
