//! Data source adapters yielding raw content for ingestion.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::Metadata;
use crate::error::{RagError, Result};

/// One raw item yielded by a data source, before chunking and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Document id to use, when the adapter knows a stable one.
    ///
    /// When absent, the ingestion pipeline falls back to the source
    /// reference, which is stable across re-ingestion of the same origin.
    pub id: Option<String>,
    /// The raw text.
    pub text: String,
    /// Opaque reference identifying the origin (path, URL, ...).
    pub source: String,
    /// Metadata to attach to the resulting document.
    pub metadata: Metadata,
}

/// An adapter producing a lazy, finite sequence of raw records.
///
/// Sources are consumed once; the iterator performs any I/O lazily so
/// large corpora are not held in memory up front.
pub trait DataSource {
    /// The record iterator type.
    type Iter: Iterator<Item = Result<SourceRecord>>;

    /// Consume the source, returning its record sequence.
    fn records(self) -> Result<Self::Iter>;
}

/// A data source over an in-memory list of records.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<SourceRecord>,
}

impl VecSource {
    /// Create a source yielding the given records in order.
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }
}

impl DataSource for VecSource {
    type Iter = std::iter::Map<
        std::vec::IntoIter<SourceRecord>,
        fn(SourceRecord) -> Result<SourceRecord>,
    >;

    fn records(self) -> Result<Self::Iter> {
        Ok(self.records.into_iter().map(Ok as fn(SourceRecord) -> Result<SourceRecord>))
    }
}

/// Read one file into a record, attaching path metadata.
fn read_record(path: PathBuf) -> Result<SourceRecord> {
    read_file_record(&path)
}

fn read_file_record(path: &Path) -> Result<SourceRecord> {
    let text = fs::read_to_string(path)
        .map_err(|e| RagError::Store(format!("failed to read {}: {e}", path.display())))?;
    let source = path.display().to_string();
    let mut metadata = Metadata::new();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.insert("file_name".to_string(), name.into());
    }
    Ok(SourceRecord { id: None, text, source, metadata })
}

/// A data source yielding a single UTF-8 text file.
#[derive(Debug, Clone)]
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    /// Create a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource for TextFileSource {
    type Iter = std::iter::Once<Result<SourceRecord>>;

    fn records(self) -> Result<Self::Iter> {
        Ok(std::iter::once(read_file_record(&self.path)))
    }
}

/// A data source yielding every file with a given extension in a
/// directory, read lazily one file at a time.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
    extension: String,
}

impl DirSource {
    /// Create a source over files in `dir` whose extension matches
    /// `extension` (without the leading dot).
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { dir: dir.into(), extension: extension.into() }
    }
}

impl DataSource for DirSource {
    type Iter =
        std::iter::Map<std::vec::IntoIter<PathBuf>, fn(PathBuf) -> Result<SourceRecord>>;

    fn records(self) -> Result<Self::Iter> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            RagError::Store(format!("failed to read directory {}: {e}", self.dir.display()))
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                RagError::Store(format!("failed to list {}: {e}", self.dir.display()))
            })?;
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.extension);
            if matches {
                paths.push(path);
            }
        }
        paths.sort();

        // The listing is materialized for deterministic order; file
        // contents are still read lazily, one record at a time.
        Ok(paths.into_iter().map(read_record as fn(PathBuf) -> Result<SourceRecord>))
    }
}
