//! Data types for documents, chunks, search results, and conversations.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar metadata value.
///
/// Metadata maps string keys to scalars only; nested structures are not
/// supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// A string value.
    Str(String),
    /// A signed integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Key-value metadata attached to documents and index entries.
pub type Metadata = HashMap<String, Scalar>;

/// An immutable unit of ingested content.
///
/// Documents are created by a data source adapter and owned by the vector
/// store once indexed. They are never mutated in place; re-ingestion
/// replaces a document by deleting its chunks and inserting fresh ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, stable across re-ingestion of the same source.
    pub id: String,
    /// Opaque reference identifying the document's origin.
    pub source: String,
    /// The raw text content.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: Metadata,
    /// When the document was ingested.
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with the given id, source reference, and text.
    ///
    /// The ingestion timestamp is set to now.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            text: text.into(),
            metadata: Metadata::new(),
            ingested_at: Utc::now(),
        }
    }

    /// Attach metadata to the document.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A sub-span of a [`Document`] produced by a chunking policy.
///
/// `start` and `end` are byte offsets into the parent document's UTF-8
/// text, always on `char` boundaries, so that
/// `&document.text[start..end] == text`. Offsets are monotonic across a
/// document's chunks and non-overlapping unless the chunker declares an
/// overlap window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier, `{document_id}_{index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within the document's chunk sequence.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Byte offset of the chunk's first byte in the document text.
    pub start: usize,
    /// Byte offset one past the chunk's last byte in the document text.
    pub end: usize,
}

impl Chunk {
    /// Create a chunk of `document_id` at `index` covering `start..end`.
    pub fn new(
        document_id: impl Into<String>,
        index: usize,
        text: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        let document_id = document_id.into();
        Self {
            id: format!("{document_id}_{index}"),
            document_id,
            index,
            text: text.into(),
            start,
            end,
        }
    }

    /// Length of the chunk span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the chunk span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A retrieved [`Chunk`] paired with a relevance score and the source
/// metadata stored alongside it.
///
/// Score semantics depend on the store's configured similarity metric;
/// higher is always more relevant. Produced per query and consumed by the
/// chain orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Metadata stored with the index entry.
    pub metadata: Metadata,
}

/// The speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// The querying user.
    User,
    /// A prior model response.
    Assistant,
}

impl Role {
    /// The lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub text: String,
}

/// Prior conversation turns used during prompt assembly.
///
/// Turns keep their insertion order. Created per request and discarded
/// after the response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn.
    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn { role, text: text.into() });
    }

    /// Iterate over turns in insertion order.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the conversation has no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_follows_document_id_and_index() {
        let chunk = Chunk::new("doc-1", 3, "text", 10, 14);
        assert_eq!(chunk.id, "doc-1_3");
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn scalar_serializes_untagged() {
        let mut metadata = Metadata::new();
        metadata.insert("page".to_string(), Scalar::Int(7));
        metadata.insert("lang".to_string(), Scalar::from("de"));
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["page"], 7);
        assert_eq!(json["lang"], "de");
    }

    #[test]
    fn conversation_preserves_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.push(Role::User, "first");
        conversation.push(Role::Assistant, "second");
        conversation.push(Role::User, "third");
        let texts: Vec<&str> = conversation.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }
}
