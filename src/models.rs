//! Core data models used throughout Shiori.
//!
//! These types represent the documents, chunks, and registry entries that
//! flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of source file a volume was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Text,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Text => "txt",
        }
    }
}

/// A loaded source volume before chunking. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name (no directory component), the registry and metadata key.
    pub filename: String,
    pub file_type: FileType,
    /// Page (PDF) or section (text) texts in reading order.
    pub pages: Vec<String>,
}

/// A bounded substring of a document's concatenated text, the unit of
/// embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Stable identifier: SHA-256 of `filename:chunk_index`. Re-ingesting a
    /// volume overwrites its chunks instead of duplicating them.
    pub id: String,
    pub source_file: String,
    /// 1-based page containing the chunk's starting offset.
    pub page: i64,
    /// Zero-based position within the source volume.
    pub chunk_index: i64,
    pub text: String,
}

/// A retrieval candidate: chunk plus its relevance score and vector.
///
/// The embedding rides along so diversity (MMR) re-ranking can compare
/// candidates without another round-trip to the store.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub embedding: Vec<f32>,
}

/// Ledger entry for one embedded volume, keyed by filename in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub status: String,
    pub chunks: usize,
    pub pages: usize,
    pub last_updated: DateTime<Utc>,
    pub file_path: PathBuf,
}

/// Status of embedding for a registry entry.
pub const STATUS_EMBEDDED: &str = "embedded";

impl RegistryEntry {
    pub fn is_embedded(&self) -> bool {
        self.status == STATUS_EMBEDDED
    }
}
