//! Document ingestion
//!
//! Loads raw content from files and URLs into normalized text units.
//! Dispatch is by URL scheme or file extension: PDF, plain text, and web
//! pages are supported. Ingestion is partial-failure tolerant: a bad
//! source is logged and skipped, never aborting the rest of the batch.

use crate::error::{AnamnesisError, Result};
use crate::types::{DocumentSource, LoadedDocument};
use reqwest::Client;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use tokio::task;
use tracing::{error, info, warn};

/// Request timeout for web-page fetches
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Loads documents from heterogeneous sources
pub struct DocumentIngestor {
    http: Client,
}

impl DocumentIngestor {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("anamnesis/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnamnesisError::Network(e.to_string()))?;

        Ok(Self { http })
    }

    /// Load every source, skipping failures
    ///
    /// Returns loaded documents in input order. Empty input yields an empty
    /// result. Per-source failures and unsupported extensions are logged
    /// and skipped so one bad PDF cannot abort a ten-file batch.
    pub async fn load_sources(&self, sources: &[DocumentSource]) -> Vec<LoadedDocument> {
        if sources.is_empty() {
            warn!("No sources were provided for ingestion");
            return Vec::new();
        }

        let mut documents = Vec::new();

        for source in sources {
            let name = source.display_name();
            match self.load_source(source).await {
                Ok(Some(doc)) => {
                    info!("Loaded document from '{}'", name);
                    documents.push(doc);
                }
                Ok(None) => {
                    // Unsupported extension, already warned
                }
                Err(e) => {
                    error!("Error loading source '{}': {}", name, e);
                }
            }
        }

        info!("Loaded {} documents from {} sources", documents.len(), sources.len());
        documents
    }

    /// Load a single source, dispatching on its kind
    ///
    /// `Ok(None)` means the source was skipped as unsupported.
    async fn load_source(&self, source: &DocumentSource) -> Result<Option<LoadedDocument>> {
        match source {
            DocumentSource::Url(url) => self.fetch_url(url).await.map(Some),
            DocumentSource::Path(path) => {
                let extension = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();

                match extension.as_str() {
                    "pdf" => self.load_pdf(path).await.map(Some),
                    "txt" | "text" => self.load_text(path).await.map(Some),
                    _ => {
                        warn!(
                            "Unsupported file extension: '.{}'. Skipping '{}'.",
                            extension,
                            source.display_name()
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Extract text from a PDF file (blocking parse, so spawn_blocking)
    async fn load_pdf(&self, path: &Path) -> Result<LoadedDocument> {
        let source = DocumentSource::from(path).display_name();
        let path = path.to_path_buf();

        let text = task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .map_err(|e| AnamnesisError::Other(format!("Task join error: {}", e)))?
            .map_err(|e| AnamnesisError::Ingestion(format!("PDF extraction failed: {}", e)))?;

        if text.trim().is_empty() {
            return Err(AnamnesisError::Ingestion(format!(
                "PDF '{}' contained no extractable text",
                source
            )));
        }

        Ok(LoadedDocument { text, source })
    }

    /// Read a plain-text file
    async fn load_text(&self, path: &Path) -> Result<LoadedDocument> {
        let source = DocumentSource::from(path).display_name();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AnamnesisError::Ingestion(format!("Failed to read '{}': {}", source, e)))?;

        Ok(LoadedDocument { text, source })
    }

    /// Fetch a URL and extract readable text
    async fn fetch_url(&self, url: &str) -> Result<LoadedDocument> {
        info!("Loading content from URL: {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AnamnesisError::Ingestion(format!("Fetch failed for '{}': {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnamnesisError::Ingestion(format!(
                "Fetch failed for '{}': HTTP {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| AnamnesisError::Ingestion(format!("Failed to read body of '{}': {}", url, e)))?;

        // Non-HTML content (plain text, JSON, ...) is taken verbatim
        let text = if content_type.contains("html") {
            html_to_text(&body)
        } else {
            body
        };

        if text.trim().is_empty() {
            return Err(AnamnesisError::Ingestion(format!(
                "Page at '{}' returned no readable text",
                url
            )));
        }

        Ok(LoadedDocument {
            text,
            source: url.to_string(),
        })
    }
}

/// Extract readable text from an HTML document
///
/// Prefers `<article>`, then `<main>`, then falls back to `<body>` — the
/// containers most likely to hold the page's actual content.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for container in ["article", "main", "body"] {
        let selector = match Selector::parse(container) {
            Ok(s) => s,
            Err(_) => continue,
        };
        let text = document
            .select(&selector)
            .map(|element| {
                element
                    .text()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n");

        if !text.trim().is_empty() {
            return text;
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_html_to_text_prefers_article() {
        let html = r#"<html><body>
            <nav>Menu Menu Menu</nav>
            <article><p>The actual content.</p><p>More content.</p></article>
        </body></html>"#;

        let text = html_to_text(html);
        assert!(text.contains("The actual content."));
        assert!(text.contains("More content."));
        assert!(!text.contains("Menu"));
    }

    #[test]
    fn test_html_to_text_falls_back_to_body() {
        let html = "<html><body><p>Plain body text.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Plain body text."));
    }

    #[test]
    fn test_html_to_text_empty_document() {
        assert!(html_to_text("<html><body></body></html>").trim().is_empty());
    }

    #[tokio::test]
    async fn test_load_text_file() {
        let ingestor = DocumentIngestor::new().unwrap();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "hello from a text file").unwrap();

        let docs = ingestor
            .load_sources(&[DocumentSource::from(file.path())])
            .await;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("hello from a text file"));
    }

    #[tokio::test]
    async fn test_unsupported_extension_skipped() {
        let ingestor = DocumentIngestor::new().unwrap();
        let file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();

        let docs = ingestor
            .load_sources(&[DocumentSource::from(file.path())])
            .await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_does_not_abort_batch() {
        let ingestor = DocumentIngestor::new().unwrap();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "still loaded").unwrap();

        let sources = vec![
            DocumentSource::classify("/nonexistent/missing.txt"),
            DocumentSource::from(file.path()),
        ];

        let docs = ingestor.load_sources(&sources).await;
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("still loaded"));
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_result() {
        let ingestor = DocumentIngestor::new().unwrap();
        let docs = ingestor.load_sources(&[]).await;
        assert!(docs.is_empty());
    }
}
