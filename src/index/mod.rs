//! Chunking and session-scoped document indexing
//!
//! Splits loaded documents into overlapping character windows, embeds
//! them, and upserts them into the vector store under a namespace derived
//! from the session id. The output is a [`DocumentRetriever`] bound to
//! that namespace — the handle the chat agent's retrieval tool wraps.
//!
//! Unlike ingestion, indexing failures are fatal for the request: a
//! partially built index would silently degrade answer quality.

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::storage::{VectorRecord, VectorStore};
use crate::types::{Chunk, LoadedDocument, RetrievedChunk};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Vector-store namespace for one session's document chunks
pub fn doc_namespace(session_id: &str) -> String {
    format!("docs:{}", session_id)
}

/// Split text into overlapping character windows
///
/// Windows start every `window - overlap` characters, so adjacent chunks
/// share exactly `overlap` characters; the final window may be shorter.
/// Operates on characters, not bytes, so multi-byte text never splits
/// inside a code point.
pub fn split_text(text: &str, window: usize, overlap: usize) -> Vec<String> {
    assert!(window > 0, "window must be positive");
    assert!(overlap < window, "overlap must be smaller than window");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let stride = window - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = usize::min(start + window, chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// Split loaded documents into provenance-tagged chunks
pub fn chunk_documents(docs: &[LoadedDocument], window: usize, overlap: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| {
            split_text(&doc.text, window, overlap)
                .into_iter()
                .enumerate()
                .map(|(seq, text)| Chunk {
                    text,
                    source: doc.source.clone(),
                    seq,
                })
        })
        .collect()
}

/// Builds a session's document index and retrieval handle
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<VectorStore>,
    window: usize,
    overlap: usize,
    top_k: usize,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<VectorStore>,
        window: usize,
        overlap: usize,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            window,
            overlap,
            top_k,
        }
    }

    /// Chunk, embed, and upsert the documents; return a retriever bound to
    /// the session's namespace
    ///
    /// Returns `Ok(None)` when there is nothing to index — callers must
    /// treat that as "nothing indexed yet", not an error. Embedding and
    /// upsert failures propagate.
    pub async fn build_retriever(
        &self,
        docs: &[LoadedDocument],
        session_id: &str,
    ) -> Result<Option<DocumentRetriever>> {
        if docs.is_empty() {
            warn!("No documents to index; skipping retriever creation");
            return Ok(None);
        }

        let namespace = doc_namespace(session_id);

        info!("Splitting {} documents into chunks for session: {}", docs.len(), session_id);
        let chunks = chunk_documents(docs, self.window, self.overlap);
        info!("Documents split into {} chunks", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                embedding,
                source: chunk.source,
                body: chunk.text,
                seq: chunk.seq as i64,
            })
            .collect();

        let stored = self.vectors.upsert(&namespace, records).await?;
        info!("Stored {} chunk vectors under namespace: {}", stored, namespace);

        Ok(Some(DocumentRetriever {
            embedder: Arc::clone(&self.embedder),
            vectors: Arc::clone(&self.vectors),
            namespace,
            top_k: self.top_k,
        }))
    }
}

/// Retrieval handle scoped to one session's namespace
pub struct DocumentRetriever {
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<VectorStore>,
    namespace: String,
    top_k: usize,
}

impl DocumentRetriever {
    /// Similarity search over this session's chunks only
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(query).await?;
        let matches = self
            .vectors
            .query(&self.namespace, &embedding, self.top_k)
            .await?;

        Ok(matches
            .into_iter()
            .map(|m| RetrievedChunk {
                text: m.body,
                source: m.source,
                score: m.score,
            })
            .collect())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
