//! Error types for the Anamnesis conversational RAG service
//!
//! This module provides structured error handling using thiserror for
//! typed error definitions and anyhow for error propagation at the edges.
//!
//! The taxonomy deliberately splits client-facing input errors
//! ([`AnamnesisError::InvalidInput`]) from collaborator failures, which the
//! HTTP layer surfaces as an opaque server error while the full cause is
//! logged.

use thiserror::Error;

/// Main error type for Anamnesis operations
#[derive(Error, Debug)]
pub enum AnamnesisError {
    /// Invalid user input (missing sources, chat before upload, empty question)
    #[error("{0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Chat history database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Vector index operation failed
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// LLM provider request failed
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// Missing or rejected provider credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Provider rate limit hit (retryable)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// A single document source could not be loaded
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Network-level failure talking to a collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Anamnesis operations
pub type Result<T> = std::result::Result<T, AnamnesisError>;

impl AnamnesisError {
    /// Whether this error originates from bad user input rather than an
    /// internal or collaborator failure. The API layer maps these to a
    /// client-error response with the message intact.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnamnesisError::InvalidInput(_))
    }
}

/// Convert anyhow::Error to AnamnesisError
impl From<anyhow::Error> for AnamnesisError {
    fn from(err: anyhow::Error) -> Self {
        AnamnesisError::Other(err.to_string())
    }
}
