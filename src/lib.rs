//! Anamnesis - Conversational RAG Service
//!
//! A Rust service for document-grounded conversation:
//! - Session-scoped document ingestion, chunking, and vector indexing
//! - Short-term conversation history and long-term semantic memory
//! - A tool-using reasoning agent grounded in the indexed documents
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (ChatTurn, Chunk, DocumentSource, ...)
//! - **Storage**: libsql chat history plus sqlite-vec vector search
//! - **Services**: embedding generation, LLM provider, document ingestion
//! - **Orchestration**: per-turn conversation state machine
//! - **API**: axum HTTP surface (upload, chat)
//!
//! # Example
//!
//! ```ignore
//! use anamnesis::{
//!     chat::ConversationOrchestrator,
//!     config::Settings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load("config/anamnesis.toml".as_ref())?;
//!     // wire components and serve; see src/main.rs
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod api;
pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use agent::{Agent, AgentBuilder};
pub use chat::ConversationOrchestrator;
pub use config::Settings;
pub use error::{AnamnesisError, Result};
pub use index::{DocumentRetriever, IndexBuilder};
pub use ingest::DocumentIngestor;
pub use memory::SemanticMemory;
pub use storage::{HistoryStore, LibsqlHistory, VectorStore};
pub use types::{ChatReply, ChatTurn, DocumentSource, LoadedDocument};
