//! Shared application state
//!
//! The retriever registry is the one piece of process-wide mutable state:
//! a session-id → retrieval-handle map living for the server process's
//! lifetime. It is wrapped in an RwLock so concurrent uploads for
//! different sessions never interfere, and same-session replacement is
//! last-successful-write-wins.

use crate::agent::AgentBuilder;
use crate::chat::ConversationOrchestrator;
use crate::index::{DocumentRetriever, IndexBuilder};
use crate::ingest::DocumentIngestor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Session-scoped retrieval-handle cache
///
/// Handles are not persisted: a restart empties the registry and sessions
/// must upload again.
#[derive(Clone, Default)]
pub struct RetrieverRegistry {
    handles: Arc<RwLock<HashMap<String, Arc<DocumentRetriever>>>>,
}

impl RetrieverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session's retriever, replacing any prior handle
    pub async fn insert(&self, session_id: &str, retriever: Arc<DocumentRetriever>) {
        let mut handles = self.handles.write().await;
        let replaced = handles.insert(session_id.to_string(), retriever).is_some();
        debug!(
            "Retriever registered for session {} (replaced: {})",
            session_id, replaced
        );
    }

    /// Look up a session's retriever
    pub async fn get(&self, session_id: &str) -> Option<Arc<DocumentRetriever>> {
        let handles = self.handles.read().await;
        handles.get(session_id).cloned()
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }
}

/// Handler state shared across requests
#[derive(Clone)]
pub struct AppState {
    pub registry: RetrieverRegistry,
    pub ingestor: Arc<DocumentIngestor>,
    pub indexer: Arc<IndexBuilder>,
    pub agents: Arc<AgentBuilder>,
    pub orchestrator: Arc<ConversationOrchestrator>,
}
