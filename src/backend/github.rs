//! README-style file in a GitHub repository, updated through the contents API.
//!
//! Every append reads the file and its blob SHA, appends a list entry and
//! writes the result back with the same SHA. GitHub rejects the write with
//! 409 when the file changed in between, which surfaces as
//! [`AppendError::Conflict`]. Nothing is retried.

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::append::file_entry;
use crate::backend::{api_error_message, BackendKind, DocumentBackend};
use crate::config::GithubConfig;
use crate::error::AppendError;

const USER_AGENT: &str = concat!("butlerbot/", env!("CARGO_PKG_VERSION"));

/// File content as read immediately before a write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub content: String,
    /// Blob SHA, the version token GitHub checks on write.
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

pub struct GithubBackend {
    client: reqwest::Client,
    config: GithubConfig,
    contents_url: String,
}

impl GithubBackend {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let (owner, name) = config.owner_and_name()?;
        let contents_url = format!(
            "{}/repos/{}/{}/contents/{}",
            config.api_base_url.trim_end_matches('/'),
            owner,
            name,
            config.path.trim_start_matches('/')
        );

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            contents_url,
        })
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.contents_url)
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
    }

    /// Read the current file content and its SHA.
    pub async fn fetch(&self) -> Result<DocumentSnapshot, AppendError> {
        debug!("Fetching {}", self.contents_url);

        let mut request = self.request(reqwest::Method::GET);
        if let Some(branch) = &self.config.branch {
            request = request.query(&[("ref", branch)]);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppendError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let contents: ContentsResponse = response
            .json()
            .await
            .map_err(|e| AppendError::Decode(format!("unexpected contents response: {e}")))?;

        if contents.encoding != "base64" {
            return Err(AppendError::Decode(format!(
                "unsupported content encoding \"{}\"",
                contents.encoding
            )));
        }

        Ok(DocumentSnapshot {
            content: decode_content(&contents.content)?,
            sha: contents.sha,
        })
    }

    /// Write `content` back, conditional on the file still being at `snapshot.sha`.
    pub async fn write(
        &self,
        snapshot: &DocumentSnapshot,
        content: &str,
    ) -> Result<(), AppendError> {
        let body = UpdateRequest {
            message: &self.config.commit_message,
            content: STANDARD.encode(content.as_bytes()),
            sha: &snapshot.sha,
            branch: self.config.branch.as_deref(),
        };

        debug!("Updating {} at {}", self.contents_url, snapshot.sha);

        let response = self
            .request(reqwest::Method::PUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = api_error_message(&body);
        if status == StatusCode::CONFLICT {
            return Err(AppendError::Conflict(message));
        }
        Err(AppendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// GitHub wraps base64 content at 60 columns; strip the line breaks first.
fn decode_content(encoded: &str) -> Result<String, AppendError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| AppendError::Decode(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| AppendError::Decode(format!("file is not valid UTF-8: {e}")))
}

#[async_trait]
impl DocumentBackend for GithubBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Github
    }

    fn target(&self) -> String {
        format!("{}:{}", self.config.repository, self.config.path)
    }

    async fn append(&self, text: &str) -> Result<(), AppendError> {
        let snapshot = self.fetch().await?;
        let updated = file_entry(&snapshot.content, text);
        self.write(&snapshot, &updated).await?;
        info!("Appended {} bytes to {}", text.len(), self.target());
        Ok(())
    }
}
