//! Short-term conversation history over libsql
//!
//! Append-only per-session log of question/answer turns, queryable by
//! recency. The write path raises failures (losing a turn breaks
//! conversational continuity); read-path leniency is the orchestrator's
//! job, not the store's.

use crate::error::{AnamnesisError, Result};
use crate::types::ChatTurn;
use async_trait::async_trait;
use chrono::Utc;
use libsql::{params, Builder, Connection};
use tracing::{debug, info};

/// Database connection mode
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    /// Local SQLite file
    Local(String),
    /// In-memory database (tests)
    InMemory,
    /// Remote libsql database
    Remote { url: String, token: String },
}

/// Store of prior chat turns
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist one turn. Errors propagate to the caller.
    async fn append(&self, session_id: &str, user_input: &str, response: &str) -> Result<()>;

    /// Up to `limit` most recent turns for the session, in chronological
    /// (oldest-first) order.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>>;
}

/// libsql-backed history store
///
/// Holds one connection for the process lifetime (libsql connections are
/// cheaply cloneable handles).
pub struct LibsqlHistory {
    conn: Connection,
}

impl LibsqlHistory {
    /// Connect and initialize the schema
    pub async fn connect(mode: ConnectionMode) -> Result<Self> {
        // Never log the Remote auth token
        match &mode {
            ConnectionMode::Local(path) => info!("Connecting to history database: {}", path),
            ConnectionMode::InMemory => info!("Connecting to in-memory history database"),
            ConnectionMode::Remote { url, .. } => {
                info!("Connecting to remote history database: {}", url)
            }
        }

        let db = match mode {
            ConnectionMode::Local(ref path) => {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            AnamnesisError::Database(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }

                Builder::new_local(path).build().await.map_err(|e| {
                    AnamnesisError::Database(format!("Failed to create local database: {}", e))
                })?
            }
            ConnectionMode::InMemory => {
                Builder::new_local(":memory:").build().await.map_err(|e| {
                    AnamnesisError::Database(format!("Failed to create in-memory database: {}", e))
                })?
            }
            ConnectionMode::Remote { url, token } => {
                Builder::new_remote(url, token).build().await.map_err(|e| {
                    AnamnesisError::Database(format!("Failed to create remote database: {}", e))
                })?
            }
        };

        let conn = db
            .connect()
            .map_err(|e| AnamnesisError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { conn };
        store.init_schema().await?;

        info!("History database connection established");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_input TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            params![],
        )
        .await
        .map_err(|e| AnamnesisError::Database(format!("Failed to create chat_turns: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_turns_session
                 ON chat_turns(session_id, id)",
            params![],
        )
        .await
        .map_err(|e| AnamnesisError::Database(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Connection {
        self.conn.clone()
    }
}

#[async_trait]
impl HistoryStore for LibsqlHistory {
    async fn append(&self, session_id: &str, user_input: &str, response: &str) -> Result<()> {
        let conn = self.conn();
        let created_at = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO chat_turns (session_id, user_input, response, created_at)
             VALUES (?, ?, ?, ?)",
            params![session_id, user_input, response, created_at],
        )
        .await
        .map_err(|e| AnamnesisError::Database(format!("Failed to insert chat turn: {}", e)))?;

        debug!("Chat turn saved for session: {}", session_id);
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        let conn = self.conn();

        let mut rows = conn
            .query(
                "SELECT session_id, user_input, response, created_at
                 FROM chat_turns
                 WHERE session_id = ?
                 ORDER BY id DESC
                 LIMIT ?",
                params![session_id, limit as i64],
            )
            .await
            .map_err(|e| AnamnesisError::Database(format!("Failed to fetch history: {}", e)))?;

        let mut turns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AnamnesisError::Database(format!("Failed to read history row: {}", e)))?
        {
            let session_id: String = row
                .get(0)
                .map_err(|e| AnamnesisError::Database(format!("Invalid row: {}", e)))?;
            let user_input: String = row
                .get(1)
                .map_err(|e| AnamnesisError::Database(format!("Invalid row: {}", e)))?;
            let response: String = row
                .get(2)
                .map_err(|e| AnamnesisError::Database(format!("Invalid row: {}", e)))?;
            let created_at: String = row
                .get(3)
                .map_err(|e| AnamnesisError::Database(format!("Invalid row: {}", e)))?;
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| AnamnesisError::Database(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);

            turns.push(ChatTurn {
                session_id,
                user_input,
                response,
                created_at,
            });
        }

        // Selected most-recent-first; the prompt wants chronological order
        turns.reverse();

        debug!(
            "Fetched {} history turns for session: {}",
            turns.len(),
            session_id
        );
        Ok(turns)
    }
}
