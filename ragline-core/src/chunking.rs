//! Document chunking policies.
//!
//! Two implementations of the [`Chunker`] trait:
//!
//! - [`FixedSizeChunker`] — character windows with a declared overlap
//! - [`SentenceChunker`] — sentence/paragraph boundaries merged up to the
//!   size limit, non-overlapping
//!
//! Both produce chunks whose `start..end` byte offsets slice the parent
//! document's text exactly, and both measure size in `char`s so multibyte
//! text never splits inside a code point.

use crate::document::{Chunk, Document};

/// A policy for splitting documents into chunks.
///
/// Chunk offsets must be monotonic within a document and non-overlapping
/// unless the policy declares an overlap window.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Byte offsets of each `char` boundary in `text`, with a final entry at
/// `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    boundaries
}

/// Splits text into fixed-size character windows with a declared overlap.
///
/// Consecutive chunks share `overlap` characters; with `overlap == 0`
/// chunks are disjoint.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker producing windows of at most `chunk_size` chars,
    /// consecutive windows sharing `overlap` chars.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }

    /// The declared overlap window in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        let boundaries = char_boundaries(&document.text);
        let total_chars = boundaries.len() - 1;
        let step = self.chunk_size.saturating_sub(self.overlap);

        let mut chunks = Vec::new();
        let mut start_char = 0;
        let mut index = 0;
        while start_char < total_chars {
            let end_char = (start_char + self.chunk_size).min(total_chars);
            let start = boundaries[start_char];
            let end = boundaries[end_char];
            chunks.push(Chunk::new(
                &document.id,
                index,
                &document.text[start..end],
                start,
                end,
            ));
            index += 1;
            if step == 0 {
                break;
            }
            start_char += step;
        }

        chunks
    }
}

/// Splits text at sentence and paragraph boundaries, merging consecutive
/// sentences until the size limit is reached.
///
/// Boundaries are `. `, `! `, `? `, and blank lines, with the separator
/// kept attached to the preceding segment. A single sentence longer than
/// `chunk_size` falls back to fixed-size windows. Chunks never overlap.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
}

impl SentenceChunker {
    /// Create a chunker merging sentences into chunks of at most
    /// `chunk_size` chars.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

/// Byte spans of the sentence segments of `text`, separator runs attached
/// to the preceding segment. The spans tile the text exactly.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let is_break = match c {
            '.' | '!' | '?' => matches!(chars.peek(), Some((_, next)) if next.is_whitespace()),
            '\n' => matches!(chars.peek(), Some((_, '\n'))),
            _ => false,
        };
        if !is_break {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            chars.next();
            end = j + w.len_utf8();
        }
        spans.push((start, end));
        start = end;
    }

    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        let text = &document.text;
        let mut merged: Vec<(usize, usize)> = Vec::new();
        let mut current: Option<(usize, usize, usize)> = None; // (start, end, chars)

        for (span_start, span_end) in sentence_spans(text) {
            let span_chars = text[span_start..span_end].chars().count();
            match current {
                Some((start, _end, chars)) if chars + span_chars <= self.chunk_size => {
                    current = Some((start, span_end, chars + span_chars));
                }
                Some((start, end, _chars)) => {
                    merged.push((start, end));
                    current = Some((span_start, span_end, span_chars));
                }
                None => {
                    current = Some((span_start, span_end, span_chars));
                }
            }
            // An oversized single sentence is flushed through fixed windows.
            if let Some((start, end, chars)) = current {
                if chars > self.chunk_size {
                    let boundaries = char_boundaries(&text[start..end]);
                    let total = boundaries.len() - 1;
                    let mut at = 0;
                    while at < total {
                        let to = (at + self.chunk_size).min(total);
                        merged.push((start + boundaries[at], start + boundaries[to]));
                        at = to;
                    }
                    current = None;
                }
            }
        }
        if let Some((start, end, _)) = current {
            merged.push((start, end));
        }

        merged
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                Chunk::new(&document.id, index, &text[start..end], start, end)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("d1", "test", text)
    }

    fn assert_slice_exact(document: &Document, chunks: &[Chunk]) {
        for chunk in chunks {
            assert_eq!(&document.text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn empty_document_produces_no_chunks() {
        assert!(FixedSizeChunker::new(10, 0).chunk(&doc("")).is_empty());
        assert!(SentenceChunker::new(10).chunk(&doc("")).is_empty());
    }

    #[test]
    fn fixed_chunks_without_overlap_are_disjoint_and_monotonic() {
        let document = doc("abcdefghijklmnopqrstuvwxyz");
        let chunks = FixedSizeChunker::new(10, 0).chunk(&document);
        assert_eq!(chunks.len(), 3);
        assert_slice_exact(&document, &chunks);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(chunks[2].text, "uvwxyz");
    }

    #[test]
    fn fixed_chunks_with_overlap_share_the_declared_window() {
        let document = doc("abcdefghijklmnopqrst");
        let chunks = FixedSizeChunker::new(8, 3).chunk(&document);
        assert_slice_exact(&document, &chunks);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end);
            assert_eq!(pair[0].end - pair[1].start, 3);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn fixed_chunker_respects_char_boundaries_in_multibyte_text() {
        let document = doc("Größe über alles: ein Maß für Verlässlichkeit");
        let chunks = FixedSizeChunker::new(7, 2).chunk(&document);
        assert!(!chunks.is_empty());
        assert_slice_exact(&document, &chunks);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 7);
        }
    }

    #[test]
    fn sentence_chunks_tile_the_document() {
        let document =
            doc("The sky is blue. Water is wet! Is fire hot? Yes.\n\nA new paragraph here.");
        let chunks = SentenceChunker::new(30).chunk(&document);
        assert_slice_exact(&document, &chunks);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, document.text.len());
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn sentence_chunker_merges_up_to_the_limit() {
        let document = doc("One. Two. Three. Four.");
        let chunks = SentenceChunker::new(11).chunk(&document);
        // "One. Two. " is 10 chars; "Three. " and "Four." merge to 12 and split.
        assert_eq!(chunks[0].text, "One. Two. ");
        assert_slice_exact(&document, &chunks);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 11);
        }
    }

    #[test]
    fn oversized_sentence_falls_back_to_fixed_windows() {
        let long = "x".repeat(50);
        let document = doc(&long);
        let chunks = SentenceChunker::new(20).chunk(&document);
        assert_eq!(chunks.len(), 3);
        assert_slice_exact(&document, &chunks);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn chunk_ids_and_indexes_are_sequential() {
        let document = doc("a. b. c. d. e. f. g. h.");
        let chunks = SentenceChunker::new(6).chunk(&document);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.id, format!("d1_{i}"));
            assert_eq!(chunk.document_id, "d1");
        }
    }
}
