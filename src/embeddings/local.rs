//! Local embedding service using fastembed
//!
//! Runs the embedding model locally via fastembed and ONNX Runtime. The
//! model is downloaded on first use to the cache directory and loaded from
//! cache afterwards. Inference is synchronous CPU work, so every call runs
//! under `spawn_blocking` to keep it off the async scheduler.

use crate::config::EmbeddingSettings;
use crate::embeddings::EmbeddingService;
use crate::error::{AnamnesisError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

/// Embedding dimension for all-MiniLM-L6-v2
pub const MINILM_EMBEDDING_DIM: usize = 384;

/// Local embedding service backed by fastembed
pub struct FastembedService {
    /// The underlying fastembed model (fastembed needs &mut for inference)
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastembedService {
    /// Create a new local embedding service
    ///
    /// Downloads the model if not already cached, which may take a while on
    /// first run.
    pub async fn new(settings: EmbeddingSettings) -> Result<Self> {
        let embedding_model = Self::model_name_to_enum(&settings.model)?;
        let dimensions = Self::dimensions_for(&settings.model);

        info!(
            "Initializing local embedding service: model={}, cache={:?}",
            settings.model, settings.cache_dir
        );

        let mut init_options = InitOptions::new(embedding_model)
            .with_show_download_progress(settings.show_download_progress);
        if let Some(cache_dir) = settings.cache_dir.clone() {
            init_options = init_options.with_cache_dir(cache_dir);
        }

        // Model load may download; keep it off the async scheduler
        let model = task::spawn_blocking(move || TextEmbedding::try_new(init_options))
            .await
            .map_err(|e| AnamnesisError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| AnamnesisError::Embedding(format!("Failed to load model: {}", e)))?;

        info!(
            "Local embedding service initialized: {} dimensions",
            dimensions
        );

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: settings.model,
            dimensions,
        })
    }

    /// Map model name string to fastembed's EmbeddingModel enum
    fn model_name_to_enum(model_name: &str) -> Result<EmbeddingModel> {
        match model_name {
            "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            _ => Err(AnamnesisError::Config(config::ConfigError::Message(
                format!("Unsupported embedding model: '{}'", model_name),
            ))),
        }
    }

    fn dimensions_for(model_name: &str) -> usize {
        match model_name {
            "bge-base-en-v1.5" => 768,
            _ => MINILM_EMBEDDING_DIM,
        }
    }

    /// Run a batch through the model in a blocking task
    async fn embed_batch_internal(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} texts", texts.len());

        let model = Arc::clone(&self.model);
        let dimensions = self.dimensions;

        let embeddings = task::spawn_blocking(move || {
            let mut model_guard = model
                .lock()
                .map_err(|e| format!("Mutex lock failed: {}", e))?;

            model_guard
                .embed(texts, None)
                .map_err(|e| format!("Embedding generation failed: {}", e))
        })
        .await
        .map_err(|e| AnamnesisError::Other(format!("Task join error: {}", e)))?
        .map_err(AnamnesisError::Embedding)?;

        for embedding in &embeddings {
            if embedding.len() != dimensions {
                return Err(AnamnesisError::Embedding(format!(
                    "Expected {} dimensions, got {}",
                    dimensions,
                    embedding.len()
                )));
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingService for FastembedService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(AnamnesisError::Embedding(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut embeddings = self.embed_batch_internal(vec![text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| AnamnesisError::Embedding("Empty embedding batch result".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            if text.is_empty() {
                return Err(AnamnesisError::Embedding(
                    "Text cannot be empty".to_string(),
                ));
            }
        }

        self.embed_batch_internal(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
