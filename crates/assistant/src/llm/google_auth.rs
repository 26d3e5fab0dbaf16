//! Google OAuth access tokens for Vertex AI.
//!
//! Tokens come from Application Default Credentials:
//!
//! - an `authorized_user` credentials file, as written by
//!   `gcloud auth application-default login`
//! - otherwise the metadata server (Cloud Run, GCE, GKE)
//!
//! Tokens are cached and refreshed a minute before they expire.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::config::VertexConfig;

use super::error::LlmError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where access tokens are minted.
enum TokenSource {
    AuthorizedUser {
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
        token_uri: String,
    },
    MetadataServer {
        url: String,
    },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizedUser { client_id, .. } => f
                .debug_struct("AuthorizedUser")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::MetadataServer { url } => {
                f.debug_struct("MetadataServer").field("url", url).finish()
            }
        }
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Cached source of Google access tokens.
pub struct GoogleTokens {
    client: reqwest::Client,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GoogleTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTokens")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl GoogleTokens {
    /// Resolve the token source for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file cannot be read or is not an
    /// `authorized_user` file.
    pub fn new(client: reqwest::Client, config: &VertexConfig) -> Result<Self, LlmError> {
        let source = match &config.credentials_file {
            Some(path) => read_credentials_file(path)?,
            None => TokenSource::MetadataServer {
                url: format!(
                    "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
                    config.metadata_host
                ),
            },
        };
        debug!(?source, "Google token source resolved");

        Ok(Self {
            client,
            source,
            cached: Mutex::new(None),
        })
    }

    /// A valid access token, fetching a new one when the cached token is
    /// missing or about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint fails.
    pub async fn token(&self) -> Result<SecretString, LlmError> {
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached
            .as_ref()
            .filter(|t| t.expires_at > Instant::now() + REFRESH_MARGIN)
        {
            return Ok(current.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = SecretString::from(fresh.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<TokenResponse, LlmError> {
        let request = match &self.source {
            TokenSource::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("grant_type", "refresh_token")
                    .append_pair("client_id", client_id)
                    .append_pair("client_secret", client_secret.expose_secret())
                    .append_pair("refresh_token", refresh_token.expose_secret())
                    .finish();
                self.client
                    .post(token_uri)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body)
            }
            TokenSource::MetadataServer { url } => {
                self.client.get(url).header("Metadata-Flavor", "Google")
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Unauthorized(format!(
                "access token request failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Parse(format!("Failed to parse token response: {e}")))?;
        debug!(expires_in = token.expires_in, "Access token refreshed");
        Ok(token)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

const fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
}

fn read_credentials_file(path: &Path) -> Result<TokenSource, LlmError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        LlmError::Unauthorized(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_credentials(&json)
}

fn parse_credentials(json: &str) -> Result<TokenSource, LlmError> {
    let file: CredentialsFile = serde_json::from_str(json)
        .map_err(|e| LlmError::Parse(format!("Invalid credentials file: {e}")))?;

    match file.kind.as_str() {
        "authorized_user" => {
            let missing =
                |field: &str| LlmError::Unauthorized(format!("credentials file lacks {field}"));
            Ok(TokenSource::AuthorizedUser {
                client_id: file.client_id.ok_or_else(|| missing("client_id"))?,
                client_secret: SecretString::from(
                    file.client_secret.ok_or_else(|| missing("client_secret"))?,
                ),
                refresh_token: SecretString::from(
                    file.refresh_token.ok_or_else(|| missing("refresh_token"))?,
                ),
                token_uri: file
                    .token_uri
                    .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            })
        }
        other => Err(LlmError::Unauthorized(format!(
            "unsupported credentials type '{other}'; use gcloud user credentials or the metadata server"
        ))),
    }
}
