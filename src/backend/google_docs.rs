//! Google Doc updated through the Docs API `batchUpdate` method.
//!
//! Auth flow:
//!   1. Reads a service account JSON key file at startup.
//!   2. Signs a JWT with RS256 (using `ring`) for the documents scope and
//!      exchanges it for an access token.
//!   3. Caches the access token and refreshes it shortly before expiry.
//!
//! Each append is a single `insertText` request at the end of the body. The
//! Docs API has no version check for this, so concurrent appends land in
//! whichever order the API applies them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::signature::{self, RsaKeyPair};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::append::doc_payload;
use crate::backend::{api_error_message, BackendKind, DocumentBackend};
use crate::config::GoogleDocsConfig;
use crate::error::AppendError;

const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";

/// Refresh this many seconds before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 120;

struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Parsed service account key.
struct ServiceAccount {
    client_email: String,
    token_uri: String,
    key_pair: RsaKeyPair,
}

#[derive(Deserialize)]
struct ServiceAccountJson {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

impl ServiceAccount {
    fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read service account key: {}", path.display())
        })?;
        let json: ServiceAccountJson = serde_json::from_str(&data).with_context(|| {
            format!("Invalid service account JSON: {}", path.display())
        })?;

        let der = pem_to_der(&json.private_key)?;
        let key_pair = RsaKeyPair::from_pkcs8(&der)
            .map_err(|e| anyhow::anyhow!("Invalid RSA private key in service account: {e}"))?;

        Ok(Self {
            client_email: json.client_email,
            token_uri: json.token_uri,
            key_pair,
        })
    }

    /// Build a signed RS256 assertion for the documents scope.
    fn signed_assertion(&self, now: i64) -> Result<String, AppendError> {
        let header = serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        });
        let claims = serde_json::json!({
            "iss": self.client_email,
            "scope": DOCUMENTS_SCOPE,
            "aud": self.token_uri,
            "iat": now,
            "exp": now + 3600
        });

        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        let message = format!("{header_b64}.{claims_b64}");

        let mut sig = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                message.as_bytes(),
                &mut sig,
            )
            .map_err(|e| AppendError::Auth(format!("RSA signing failed: {e}")))?;

        Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(&sig)))
    }
}

/// Decode a PEM-encoded PKCS#8 private key to DER bytes.
fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;

    let b64: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("");

    STANDARD
        .decode(b64.trim())
        .context("Invalid PEM base64 in service account private key")
}

pub struct GoogleDocsBackend {
    client: reqwest::Client,
    document_id: String,
    batch_update_url: String,
    service_account: ServiceAccount,
    cached: RwLock<Option<CachedToken>>,
}

impl GoogleDocsBackend {
    pub fn new(config: GoogleDocsConfig) -> Result<Self> {
        let service_account = ServiceAccount::from_file(&config.credentials_path)?;
        let batch_update_url = format!(
            "{}/v1/documents/{}:batchUpdate",
            config.api_base_url.trim_end_matches('/'),
            config.document_id
        );

        Ok(Self {
            client: reqwest::Client::new(),
            document_id: config.document_id,
            batch_update_url,
            service_account,
            cached: RwLock::new(None),
        })
    }

    /// Return a valid access token, exchanging a fresh JWT when needed.
    async fn ensure_token(&self) -> Result<String, AppendError> {
        let now = chrono::Utc::now().timestamp();
        {
            let cached = self.cached.read().await;
            if let Some(ref c) = *cached {
                if now + EXPIRY_MARGIN_SECS < c.expires_at {
                    return Ok(c.token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(ref c) = *cached {
            if now + EXPIRY_MARGIN_SECS < c.expires_at {
                return Ok(c.token.clone());
            }
        }

        info!("Exchanging service account JWT for a Docs access token");
        let fresh = self.exchange_jwt(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn exchange_jwt(&self, now: i64) -> Result<CachedToken, AppendError> {
        let jwt = self.service_account.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.service_account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppendError::Auth(format!(
                "token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppendError::Auth(format!("unexpected token response: {e}")))?;

        debug!(expires_in = token.expires_in, "Docs access token obtained");

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}

/// `batchUpdate` body inserting `text` at the end of the document body.
fn insert_at_end_request(text: &str) -> serde_json::Value {
    serde_json::json!({
        "requests": [{
            "insertText": {
                "text": text,
                "endOfSegmentLocation": {}
            }
        }]
    })
}

#[async_trait]
impl DocumentBackend for GoogleDocsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GoogleDocs
    }

    fn target(&self) -> String {
        format!("document {}", self.document_id)
    }

    async fn append(&self, text: &str) -> Result<(), AppendError> {
        let token = self.ensure_token().await?;
        let body = insert_at_end_request(&doc_payload(text));

        debug!("Sending batchUpdate to {}", self.batch_update_url);

        let response = self
            .client
            .post(&self.batch_update_url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Docs batchUpdate rejected");
            return Err(AppendError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        info!("Appended {} bytes to {}", text.len(), self.target());
        Ok(())
    }
}
