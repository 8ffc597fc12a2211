//! Core data types shared across the service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A document source handed to the ingestor: a local file or a URL.
///
/// Transient — consumed during ingestion, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Url(String),
}

impl DocumentSource {
    /// Classify a raw source string by URL scheme
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            DocumentSource::Url(raw.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(raw))
        }
    }

    /// Short human-readable name used in logs and chunk provenance
    pub fn display_name(&self) -> String {
        match self {
            DocumentSource::Url(url) => url.clone(),
            DocumentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string()),
        }
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

/// A normalized unit of loaded content with its provenance
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Extracted plain text
    pub text: String,
    /// Source name (file basename or URL)
    pub source: String,
}

/// A bounded, overlapping slice of a source document prepared for embedding
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    /// Source provenance, carried into the vector index metadata
    pub source: String,
    /// Position within the source document
    pub seq: usize,
}

/// A chunk returned from session-scoped document retrieval
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    /// Cosine similarity to the query, descending across a result set
    pub score: f32,
}

/// One question/answer pair in a session's append-only history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub user_input: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// The chat operation's result: the answer plus the echoed inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub question: String,
    pub response: String,
}
