//! Configuration for the Anamnesis service
//!
//! Settings are loaded once at startup from a TOML file plus `ANAMNESIS_*`
//! environment overrides, deserialized into typed structs with defaults for
//! every field, and passed explicitly into each component's constructor.
//! A missing or malformed configuration file is fatal before the server
//! accepts traffic.

use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level settings, one section per concern
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub chunking: ChunkingSettings,
    pub history: HistorySettings,
    pub memory: MemorySettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub log: LogSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS (the local frontend by default)
    pub allowed_origins: Vec<String>,
    /// Maximum accepted upload body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8501".to_string(),
            ],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            config::ConfigError::Message(format!(
                "Invalid server address {}:{}: {}",
                self.host, self.port, e
            ))
            .into()
        })
    }
}

/// Storage settings
///
/// One SQLite file backs both stores: libsql for chat turns, rusqlite with
/// sqlite-vec for vectors (dual storage, separate tables). Setting
/// `history_url`/`auth_token` moves the chat history to a remote libsql
/// database instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: String,
    pub history_url: Option<String>,
    pub auth_token: Option<String>,
    pub pool_size: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "data/anamnesis.db".to_string(),
            history_url: None,
            auth_token: None,
            pool_size: 20,
        }
    }
}

/// Chunking and document-retrieval settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target chunk size in characters
    pub window: usize,
    /// Characters shared between adjacent chunks
    pub overlap: usize,
    /// Result count for document retrieval
    pub top_k: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            window: 1000,
            overlap: 150,
            top_k: 5,
        }
    }
}

/// Short-term history settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// How many recent turns are injected into the prompt
    pub recall_limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { recall_limit: 5 }
    }
}

/// Long-term semantic memory settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Result count for memory retrieval
    pub top_k: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Embedding model settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Model name (must be one fastembed knows)
    pub model: String,
    /// Model download/cache directory (fastembed default when unset)
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

/// LLM provider settings (API key comes from the environment, never the file)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub base_url: String,
    /// Optional file overriding the built-in agent instruction template
    pub prompt_path: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            base_url: "https://api.anthropic.com/v1".to_string(),
            prompt_path: None,
        }
    }
}

/// Logging settings
///
/// `filter` takes tracing EnvFilter directives, so individual components can
/// be routed to their own verbosity, e.g. `info,anamnesis::ingest=debug`.
/// `RUST_LOG` overrides it when set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, applying `ANAMNESIS_*` environment
    /// overrides (double underscore as section separator, e.g.
    /// `ANAMNESIS_SERVER__PORT=9000`).
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("ANAMNESIS").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.window == 0 {
            return Err(config::ConfigError::Message(
                "chunking.window must be greater than zero".to_string(),
            )
            .into());
        }
        if self.chunking.overlap >= self.chunking.window {
            return Err(config::ConfigError::Message(format!(
                "chunking.overlap ({}) must be smaller than chunking.window ({})",
                self.chunking.overlap, self.chunking.window
            ))
            .into());
        }
        if self.chunking.top_k == 0 || self.memory.top_k == 0 {
            return Err(config::ConfigError::Message(
                "top_k values must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
