//! Vector store backends for the Ragline retrieval pipeline.
//!
//! This crate provides:
//! - The [`VectorStore`] trait: upsert, per-document delete, and
//!   filtered k-nearest-neighbor search with deterministic ordering
//! - [`InMemoryVectorStore`] — the exact brute-force reference
//!   implementation
//! - [`FileVectorStore`] — a persistent store with a versioned snapshot
//!   header that fails fast on configuration mismatches
//! - Similarity scoring for the configured store-wide metric

pub mod file;
pub mod memory;
pub mod metric;
pub mod store;

pub use file::FileVectorStore;
pub use memory::InMemoryVectorStore;
pub use metric::score;
pub use store::{IndexEntry, MetadataFilter, VectorStore};
