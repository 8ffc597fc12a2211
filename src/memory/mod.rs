//! Long-term semantic memory
//!
//! Content-addressed, per-owner memory statements in the shared vector
//! store. The entry id is a pure function of (owner, text), so storing the
//! same statement twice overwrites instead of duplicating. Every failure on
//! this path is a typed error — memory unavailability must be visible, in
//! contrast to the deliberately lenient short-term history read path.

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::storage::{VectorRecord, VectorStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Vector-store namespace for one owner's memories
pub fn memory_namespace(owner_id: &str) -> String {
    format!("memory:{}", owner_id)
}

/// Semantic memory store scoped by owner id
pub struct SemanticMemory {
    embedder: Arc<dyn EmbeddingService>,
    vectors: Arc<VectorStore>,
    top_k: usize,
}

impl SemanticMemory {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        vectors: Arc<VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            top_k,
        }
    }

    /// Deterministic entry id: owner plus a hash of the memory text
    pub fn entry_id(owner_id: &str, memory_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(memory_text.as_bytes());
        format!("{}-{:x}", owner_id, hasher.finalize())
    }

    /// Embed a memory or query text. Failures propagate — no memory
    /// operation can proceed without an embedding.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Store a memory statement for an owner. Idempotent: repeating the
    /// same (owner, text) pair replaces the existing entry.
    pub async fn store(&self, owner_id: &str, memory_text: &str) -> Result<()> {
        let embedding = self.embed(memory_text).await?;
        let record = VectorRecord {
            id: Self::entry_id(owner_id, memory_text),
            embedding,
            source: owner_id.to_string(),
            body: memory_text.to_string(),
            seq: 0,
        };

        self.vectors
            .upsert(&memory_namespace(owner_id), vec![record])
            .await?;

        debug!("Memory stored: owner={} text='{}'", owner_id, memory_text);
        Ok(())
    }

    /// Retrieve up to `top_k` memory texts for an owner, ordered by
    /// descending similarity to the query. Empty when nothing matches.
    pub async fn retrieve(&self, owner_id: &str, query: &str) -> Result<Vec<String>> {
        let embedding = self.embed(query).await?;
        let matches = self
            .vectors
            .query(&memory_namespace(owner_id), &embedding, self.top_k)
            .await?;

        if matches.is_empty() {
            debug!("No memories retrieved for owner={}", owner_id);
            return Ok(Vec::new());
        }

        debug!(
            "Memories retrieved: owner={} query='{}' matches={}",
            owner_id,
            query,
            matches.len()
        );

        Ok(matches.into_iter().map(|m| m.body).collect())
    }
}
