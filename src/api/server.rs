//! HTTP API server
//!
//! Two operations: upload documents for a session and chat against them.
//! Client errors (missing sources, chat before upload) surface with their
//! message; collaborator failures are logged in full and surfaced as an
//! opaque server error.

use crate::api::state::AppState;
use crate::error::AnamnesisError;
use crate::types::{ChatReply, DocumentSource};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub addr: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 8000).into(),
            allowed_origins: Vec::new(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// HTTP-facing error: status code plus client-visible message
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }
}

impl From<AnamnesisError> for ApiError {
    fn from(err: AnamnesisError) -> Self {
        if err.is_client_error() {
            ApiError {
                status: StatusCode::BAD_REQUEST,
                detail: err.to_string(),
            }
        } else {
            // Full cause stays server-side; the client gets an opaque error
            error!("Internal error: {}", err);
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "Error processing request.".to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: String,
    question: String,
}

/// Build the router
pub fn build_router(state: AppState, config: &ApiServerConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route(
            "/upload-docs",
            post(upload_docs_handler).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start serving until ctrl-c
pub async fn serve(state: AppState, config: ApiServerConfig) -> anyhow::Result<()> {
    let router = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Serving on http://{}", config.addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

async fn root_handler() -> Json<MessageBody> {
    Json(MessageBody {
        message: "Anamnesis conversational RAG service running".to_string(),
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Upload documents and build the session's retriever
///
/// Multipart fields: `session_id` (required), repeated `files` parts,
/// repeated `urls` fields. At least one file or URL is required. Uploaded
/// bytes are spooled to a per-request temp directory that is removed when
/// the request finishes.
async fn upload_docs_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageBody>, ApiError> {
    let mut session_id = String::new();
    let mut urls: Vec<String> = Vec::new();
    let mut spooled: Vec<std::path::PathBuf> = Vec::new();

    let temp_dir = tempfile::tempdir().map_err(AnamnesisError::from)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => {
                session_id = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid session_id: {}", e)))?
                    .trim()
                    .to_string();
            }
            "urls" => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid url field: {}", e)))?
                    .trim()
                    .to_string();
                if !url.is_empty() {
                    urls.push(url);
                }
            }
            "files" => {
                // Keep only the basename; the extension drives loader dispatch
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "upload.txt".to_string());
                let file_name = std::path::Path::new(&file_name)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "upload.txt".to_string());

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

                let path = temp_dir.path().join(file_name);
                tokio::fs::write(&path, &bytes)
                    .await
                    .map_err(AnamnesisError::from)?;
                spooled.push(path);
            }
            other => {
                info!("Ignoring unknown multipart field: {}", other);
            }
        }
    }

    if session_id.is_empty() {
        return Err(ApiError::bad_request("session_id is required."));
    }
    if spooled.is_empty() && urls.is_empty() {
        return Err(ApiError::bad_request(
            "Provide at least one document or URL.",
        ));
    }

    let sources: Vec<DocumentSource> = spooled
        .iter()
        .map(|path| DocumentSource::Path(path.clone()))
        .chain(urls.iter().map(|url| DocumentSource::Url(url.clone())))
        .collect();

    info!(
        "Upload received | session_id={} files={} urls={}",
        session_id,
        spooled.len(),
        urls.len()
    );

    let docs = state.ingestor.load_sources(&sources).await;

    let retriever = state
        .indexer
        .build_retriever(&docs, &session_id)
        .await
        .map_err(ApiError::from)?;

    match retriever {
        Some(retriever) => {
            state.registry.insert(&session_id, Arc::new(retriever)).await;
            Ok(Json(MessageBody {
                message: "Documents processed successfully".to_string(),
            }))
        }
        None => Err(ApiError::bad_request(
            "None of the provided sources could be loaded.",
        )),
    }
}

/// Answer a question against a previously uploaded session
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let session_id = request.session_id.trim();
    let question = request.question.trim();

    if session_id.is_empty() {
        return Err(ApiError::bad_request("session_id is required."));
    }
    if question.is_empty() {
        return Err(ApiError::bad_request("question is required."));
    }

    // Precondition: the session must have uploaded documents. This is a
    // distinct client error, not an internal failure.
    let retriever = state
        .registry
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::bad_request("You must upload documents first."))?;

    let agent = state.agents.build(retriever);

    let reply = state
        .orchestrator
        .respond(&agent, session_id, question)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(reply))
}
