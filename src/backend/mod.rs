pub mod github;
pub mod google_docs;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::error::AppendError;

/// Which kind of document a backend writes to. Decides the chat command name
/// and the wording of replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Github,
    GoogleDocs,
}

impl BackendKind {
    /// Name of the append command, without the leading slash.
    pub fn append_command(self) -> &'static str {
        match self {
            BackendKind::Github => "addagent",
            BackendKind::GoogleDocs => "add",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Github => write!(f, "github"),
            BackendKind::GoogleDocs => write!(f, "google_docs"),
        }
    }
}

/// A shared external document that text can be appended to.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Human readable target, used in logs.
    fn target(&self) -> String;

    /// Append `text` to the end of the document. Performs at most one write.
    async fn append(&self, text: &str) -> Result<(), AppendError>;
}

/// Construct the backend selected in configuration.
pub fn from_config(config: BackendConfig) -> Result<Arc<dyn DocumentBackend>> {
    let backend: Arc<dyn DocumentBackend> = match config {
        BackendConfig::Github(gh) => Arc::new(
            github::GithubBackend::new(gh).context("Failed to initialize GitHub backend")?,
        ),
        BackendConfig::GoogleDocs(docs) => Arc::new(
            google_docs::GoogleDocsBackend::new(docs)
                .context("Failed to initialize Google Docs backend")?,
        ),
    };
    Ok(backend)
}

/// Extract the `message` field GitHub and Google put in JSON error bodies,
/// falling back to the raw body.
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error").and_then(|e| e.get("message")))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
