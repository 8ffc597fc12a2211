//! Anamnesis - Conversational RAG Service
//!
//! Entry point: loads configuration, wires the storage and model
//! collaborators, and serves the HTTP API.

use anamnesis::{
    agent::AgentBuilder,
    api::{self, ApiServerConfig, AppState, RetrieverRegistry},
    chat::ConversationOrchestrator,
    config::Settings,
    embeddings::{EmbeddingService, FastembedService},
    error::AnamnesisError,
    index::IndexBuilder,
    ingest::DocumentIngestor,
    llm::{AnthropicClient, LlmClientConfig},
    memory::SemanticMemory,
    storage::{ConnectionMode, LibsqlHistory, VectorStore},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anamnesis", version, about = "Conversational RAG service")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config/anamnesis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration errors are fatal before any traffic is served
    let mut settings = Settings::load(&cli.config)?;

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log.filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::CheckConfig => {
            println!("Configuration OK: {}", cli.config.display());
            Ok(())
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            run_server(settings).await
        }
    }
}

async fn run_server(settings: Settings) -> anyhow::Result<()> {
    info!("Starting Anamnesis conversational RAG server...");

    // Provider credentials are checked up front so a misconfigured server
    // fails at startup, not on the first chat turn
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| AnamnesisError::Authentication("ANTHROPIC_API_KEY not set".to_string()))?;

    // Chat history store (local file or remote libsql)
    let history_mode = match (&settings.storage.history_url, &settings.storage.auth_token) {
        (Some(url), Some(token)) => ConnectionMode::Remote {
            url: url.clone(),
            token: token.clone(),
        },
        _ => ConnectionMode::Local(settings.storage.db_path.clone()),
    };
    let history = Arc::new(LibsqlHistory::connect(history_mode).await?);

    // Embedding model (downloads on first run)
    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(FastembedService::new(settings.embedding.clone()).await?);

    // Vector store shares the history database file (separate tables)
    let vectors = Arc::new(VectorStore::with_pool_size(
        &settings.storage.db_path,
        embedder.dimensions(),
        settings.storage.pool_size,
    )?);
    vectors.init_schema().await?;

    // LLM provider and agent factory
    let provider = Arc::new(AnthropicClient::new(LlmClientConfig::from_settings(
        &settings.llm,
        api_key,
    ))?);
    let agents = Arc::new(AgentBuilder::new(
        provider,
        settings.llm.prompt_path.as_deref(),
    ));

    // Core components
    let ingestor = Arc::new(DocumentIngestor::new()?);
    let indexer = Arc::new(IndexBuilder::new(
        Arc::clone(&embedder),
        Arc::clone(&vectors),
        settings.chunking.window,
        settings.chunking.overlap,
        settings.chunking.top_k,
    ));
    let memory = Arc::new(SemanticMemory::new(
        Arc::clone(&embedder),
        Arc::clone(&vectors),
        settings.memory.top_k,
    ));
    let orchestrator = Arc::new(ConversationOrchestrator::new(
        history,
        memory,
        settings.history.recall_limit,
    ));

    let state = AppState {
        registry: RetrieverRegistry::new(),
        ingestor,
        indexer,
        agents,
        orchestrator,
    };

    let config = ApiServerConfig {
        addr: settings.server.addr()?,
        allowed_origins: settings.server.allowed_origins.clone(),
        max_upload_bytes: settings.server.max_upload_bytes,
    };

    api::serve(state, config).await?;

    info!("Shutting down Anamnesis server");
    Ok(())
}
