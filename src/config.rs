use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backend::BackendKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// The `[backend]` table. `kind` selects the variant.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Github(GithubConfig),
    GoogleDocs(GoogleDocsConfig),
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    pub token: String,
    /// `owner/name`
    pub repository: String,
    #[serde(default = "default_file_path")]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_github_api")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleDocsConfig {
    pub document_id: String,
    /// Service account JSON key with the documents scope granted.
    pub credentials_path: PathBuf,
    #[serde(default = "default_docs_api")]
    pub api_base_url: String,
}

fn default_file_path() -> String {
    "README.md".to_string()
}

fn default_commit_message() -> String {
    "Add new agent link via Telegram bot".to_string()
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_docs_api() -> String {
    "https://docs.googleapis.com".to_string()
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Github(_) => BackendKind::Github,
            BackendConfig::GoogleDocs(_) => BackendKind::GoogleDocs,
        }
    }
}

impl GithubConfig {
    /// Split `repository` into owner and name.
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        match self.repository.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner, name))
            }
            _ => anyhow::bail!(
                "GitHub repository must be in \"owner/name\" form, got \"{}\"",
                self.repository
            ),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from process environment variables, after
    /// loading a `.env` file from the working directory if there is one.
    /// Variables already set in the process take precedence over the file.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from environment-style keys supplied by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("Missing required environment variable {key}"))
        };

        let bot_token = require("TELEGRAM_BOT_TOKEN")?;

        let kind = match get("BUTLERBOT_BACKEND").as_deref() {
            Some("github") => BackendKind::Github,
            Some("google_docs") => BackendKind::GoogleDocs,
            Some(other) => anyhow::bail!(
                "Unknown BUTLERBOT_BACKEND \"{other}\" (expected \"github\" or \"google_docs\")"
            ),
            None if get("GITHUB_REPO").is_some() => BackendKind::Github,
            None if get("GOOGLE_DOCUMENT_ID").is_some() => BackendKind::GoogleDocs,
            None => anyhow::bail!(
                "No document backend configured: set GITHUB_TOKEN and GITHUB_REPO, \
                 or GOOGLE_DOCUMENT_ID and GOOGLE_APPLICATION_CREDENTIALS"
            ),
        };

        let backend = match kind {
            BackendKind::Github => BackendConfig::Github(GithubConfig {
                token: require("GITHUB_TOKEN")?,
                repository: require("GITHUB_REPO")?,
                path: get("GITHUB_FILE_PATH").unwrap_or_else(default_file_path),
                branch: get("GITHUB_BRANCH"),
                commit_message: default_commit_message(),
                api_base_url: default_github_api(),
            }),
            BackendKind::GoogleDocs => BackendConfig::GoogleDocs(GoogleDocsConfig {
                document_id: require("GOOGLE_DOCUMENT_ID")?,
                credentials_path: PathBuf::from(require("GOOGLE_APPLICATION_CREDENTIALS")?),
                api_base_url: default_docs_api(),
            }),
        };

        let config = Config {
            telegram: TelegramConfig { bot_token },
            backend,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }

        match &self.backend {
            BackendConfig::Github(gh) => {
                if gh.token.trim().is_empty() {
                    anyhow::bail!("backend.token must not be empty");
                }
                if gh.path.trim().is_empty() {
                    anyhow::bail!("backend.path must not be empty");
                }
                gh.owner_and_name()?;
            }
            BackendConfig::GoogleDocs(docs) => {
                if docs.document_id.trim().is_empty() {
                    anyhow::bail!("backend.document_id must not be empty");
                }
                if docs.credentials_path.as_os_str().is_empty() {
                    anyhow::bail!("backend.credentials_path must not be empty");
                }
            }
        }

        Ok(())
    }
}
