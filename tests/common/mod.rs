//! Shared test fixtures: deterministic embedder, scripted LLM provider,
//! and store builders over temp files.
#![allow(dead_code)]

use anamnesis::embeddings::EmbeddingService;
use anamnesis::error::{AnamnesisError, Result};
use anamnesis::llm::{Completion, CompletionRequest, ContentBlock, LlmProvider};
use anamnesis::storage::VectorStore;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Deterministic word-hash embedder; shared by tests that need real
/// vector-store round trips without a model download.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let dim = (hasher.finish() as usize) % self.dimensions;
            embedding[dim] += 1.0;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hash-test-embedder"
    }
}

/// An embedder that always fails, for strict-path error tests
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AnamnesisError::Embedding("embedder offline".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(AnamnesisError::Embedding("embedder offline".to_string()))
    }

    fn dimensions(&self) -> usize {
        16
    }

    fn model_name(&self) -> &str {
        "failing-test-embedder"
    }
}

/// Scripted LLM provider: pops one canned completion per call and records
/// every request it receives.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Completion>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Completion>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider that always answers with one text block
    pub fn answering(text: &str) -> Self {
        Self::new(vec![text_completion(text)])
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AnamnesisError::LlmApi("scripted provider exhausted".to_string()))
    }
}

/// A provider that always fails, for REASON-state error tests
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        Err(AnamnesisError::LlmApi("provider unreachable".to_string()))
    }
}

pub fn text_completion(text: &str) -> Completion {
    Completion {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some("end_turn".to_string()),
    }
}

pub fn tool_use_completion(id: &str, query: &str) -> Completion {
    Completion {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: "search_documents".to_string(),
            input: serde_json::json!({ "query": query }),
        }],
        stop_reason: Some("tool_use".to_string()),
    }
}

/// A vector store over a fresh temp file, schema ready
pub async fn temp_vector_store(dimensions: usize) -> (Arc<VectorStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = VectorStore::open(temp_dir.path().join("test.db"), dimensions).unwrap();
    store.init_schema().await.unwrap();
    (Arc::new(store), temp_dir)
}
