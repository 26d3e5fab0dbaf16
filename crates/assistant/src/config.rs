//! Assistant configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LINE_CHANNEL_SECRET` (or `ChannelSecret`) - LINE channel secret (webhook signatures)
//! - `LINE_CHANNEL_ACCESS_TOKEN` (or `ChannelAccessToken`) - LINE channel access token
//! - `BOT_HOST_URL` - Public base URL of this service, used for image URLs
//! - One chat model credential:
//!   - `CLAUDE_API_KEY`
//!   - `GOOGLE_API_KEY`
//!   - `GOOGLE_GENAI_USE_VERTEXAI=true` with `GOOGLE_CLOUD_PROJECT`
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8080)
//! - `LINE_API_BASE` - LINE Messaging API base URL (default: <https://api.line.me/v2/bot>)
//! - `LLM_PROVIDER` - `claude`, `gemini` or `vertex` (default: Vertex when
//!   `GOOGLE_GENAI_USE_VERTEXAI` is set, then whichever key is set, Claude first)
//! - `CLAUDE_MODEL` - Claude model ID (default: claude-sonnet-4-20250514)
//! - `GEMINI_MODEL` - Gemini model ID, also used on Vertex (default: gemini-2.0-flash)
//! - `GOOGLE_CLOUD_LOCATION` - Vertex AI region (default: us-central1)
//! - `GOOGLE_APPLICATION_CREDENTIALS` - `authorized_user` credentials file for Vertex
//!   (default: gcloud's ADC file if present, else the metadata server)
//! - `GCE_METADATA_HOST` - Metadata server host (default: metadata.google.internal)
//! - `LLM_TIMEOUT_SECS` - Per-call model timeout (default: 30)
//! - `MAX_TOOL_ITERATIONS` - Model calls per message (default: 5)
//! - `HISTORY_LIMIT` - Stored turns per user (default: 20, at least
//!   `2 * MAX_TOOL_ITERATIONS + 1`)
//! - `SESSION_CAPACITY` - Users with stored state (default: 10000)
//! - `SESSION_IDLE_SECS` - Idle expiry for per-user state (default: 86400)
//! - `IMAGE_CACHE_TTL_SECS` - Lifetime of reply images (default: 3600)
//! - `PRODUCT_ASSETS_DIR` - Directory holding pre-made product JPEGs
//! - `DEMO_TODAY` - Reference date for order history windows (default: 2026-02-22)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry traces sample rate (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::SecretString;
use thiserror::Error;

use crate::catalog::{DEMO_TODAY, LedgerSettings};
use crate::line::LINE_API_BASE;
use crate::services::{ConversationSettings, SessionSettings};

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_VERTEX_LOCATION: &str = "us-central1";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const GCLOUD_ADC_FILE: &str = ".config/gcloud/application_default_credentials.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Environment variables as a map.
pub type EnvVars = HashMap<String, String>;

/// Snapshot of the process environment, after loading `.env` if present.
#[must_use]
pub fn env_vars() -> EnvVars {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();
    std::env::vars().collect()
}

/// Assistant application configuration.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub bot_host_url: String,
    /// LINE channel credentials
    pub line: LineConfig,
    /// Chat model configuration
    pub llm: LlmConfig,
    /// Tool loop settings
    pub conversation: ConversationSettings,
    /// Conversation history eviction
    pub sessions: SessionSettings,
    /// Order ledger eviction
    pub ledger: LedgerSettings,
    /// How long reply images stay downloadable
    pub image_cache_ttl: Duration,
    /// Directory for pre-made product images
    pub assets_dir: Option<PathBuf>,
    /// Reference date for order history windows
    pub demo_today: NaiveDate,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// LINE Messaging API credentials.
///
/// Implements `Debug` manually to redact the credentials.
#[derive(Clone)]
pub struct LineConfig {
    /// Channel secret for webhook signature verification
    pub channel_secret: SecretString,
    /// Channel access token for the reply API
    pub channel_access_token: SecretString,
    /// Messaging API base URL, without trailing slash
    pub api_base: String,
}

impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_secret", &"[REDACTED]")
            .field("channel_access_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Which chat model backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Anthropic Claude.
    Claude,
    /// Google Gemini through the Generative Language API.
    Gemini,
    /// Google Gemini through Vertex AI.
    Vertex,
}

impl LlmProvider {
    /// Provider name as used in `LLM_PROVIDER`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Vertex => "vertex",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "gemini" | "google" => Ok(Self::Gemini),
            "vertex" | "vertexai" | "vertex_ai" => Ok(Self::Vertex),
            other => Err(format!(
                "unknown provider '{other}', expected claude, gemini or vertex"
            )),
        }
    }
}

/// Chat model configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Selected backend
    pub provider: LlmProvider,
    /// How to authenticate with the backend
    pub credentials: LlmCredentials,
    /// Model ID
    pub model: String,
}

/// Chat model credentials.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub enum LlmCredentials {
    /// Static API key (Claude, Gemini).
    ApiKey(SecretString),
    /// Application Default Credentials for a Vertex AI project.
    Vertex(VertexConfig),
}

impl std::fmt::Debug for LlmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            Self::Vertex(vertex) => f.debug_tuple("Vertex").field(vertex).finish(),
        }
    }
}

/// Vertex AI project settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexConfig {
    /// Google Cloud project ID
    pub project: String,
    /// Region, or `global`
    pub location: String,
    /// `authorized_user` credentials file; the metadata server is used when unset
    pub credentials_file: Option<PathBuf>,
    /// Metadata server host
    pub metadata_host: String,
}

impl VertexConfig {
    fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let credentials_file = get_optional_env(vars, "GOOGLE_APPLICATION_CREDENTIALS")
            .map(PathBuf::from)
            .or_else(|| {
                get_optional_env(vars, "HOME")
                    .map(|home| Path::new(&home).join(GCLOUD_ADC_FILE))
                    .filter(|path| path.is_file())
            });

        Ok(Self {
            project: get_required_env(vars, "GOOGLE_CLOUD_PROJECT")?,
            location: get_env_or_default(vars, "GOOGLE_CLOUD_LOCATION", DEFAULT_VERTEX_LOCATION),
            credentials_file,
            metadata_host: get_env_or_default(vars, "GCE_METADATA_HOST", DEFAULT_METADATA_HOST),
        })
    }
}

impl LlmConfig {
    /// Load the chat model configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no usable credential is configured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env_vars())
    }

    /// Load the chat model configuration from `vars`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `LLM_PROVIDER` is invalid, the selected
    /// provider has no API key, or Vertex AI is selected without a project.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let provider = match get_optional_env(vars, "LLM_PROVIDER") {
            Some(value) => value
                .parse::<LlmProvider>()
                .map_err(|e| ConfigError::InvalidEnvVar("LLM_PROVIDER".to_string(), e))?,
            None if get_bool_env(vars, "GOOGLE_GENAI_USE_VERTEXAI") => LlmProvider::Vertex,
            None if get_optional_env(vars, "CLAUDE_API_KEY").is_some() => LlmProvider::Claude,
            None if get_optional_env(vars, "GOOGLE_API_KEY").is_some() => LlmProvider::Gemini,
            None => {
                return Err(ConfigError::MissingEnvVar(
                    "CLAUDE_API_KEY, GOOGLE_API_KEY or GOOGLE_GENAI_USE_VERTEXAI".to_string(),
                ));
            }
        };

        let (credentials, model) = match provider {
            LlmProvider::Claude => (
                LlmCredentials::ApiKey(get_required_secret(vars, "CLAUDE_API_KEY")?),
                get_env_or_default(vars, "CLAUDE_MODEL", DEFAULT_CLAUDE_MODEL),
            ),
            LlmProvider::Gemini => (
                LlmCredentials::ApiKey(get_required_secret(vars, "GOOGLE_API_KEY")?),
                get_env_or_default(vars, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            ),
            LlmProvider::Vertex => (
                LlmCredentials::Vertex(VertexConfig::from_vars(vars)?),
                get_env_or_default(vars, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            ),
        };

        Ok(Self {
            provider,
            credentials,
            model,
        })
    }

    /// The static API key, if the backend uses one.
    #[must_use]
    pub const fn api_key(&self) -> Option<&SecretString> {
        match &self.credentials {
            LlmCredentials::ApiKey(key) => Some(key),
            LlmCredentials::Vertex(_) => None,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env_vars())
    }

    /// Load configuration from `vars`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(vars: &EnvVars) -> Result<Self, ConfigError> {
        let host = parse_env(vars, "HOST", "0.0.0.0")?;
        let port = parse_env(vars, "PORT", "8080")?;
        let bot_host_url = get_required_env(vars, "BOT_HOST_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&bot_host_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BOT_HOST_URL".to_string(), e.to_string()))?;

        let line = LineConfig {
            channel_secret: get_required_secret_or(vars, "LINE_CHANNEL_SECRET", "ChannelSecret")?,
            channel_access_token: get_required_secret_or(
                vars,
                "LINE_CHANNEL_ACCESS_TOKEN",
                "ChannelAccessToken",
            )?,
            api_base: get_env_or_default(vars, "LINE_API_BASE", LINE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        };
        let llm = LlmConfig::from_vars(vars)?;

        let conversation = ConversationSettings {
            max_iterations: parse_env(vars, "MAX_TOOL_ITERATIONS", "5")?,
            history_limit: parse_env(vars, "HISTORY_LIMIT", "20")?,
            llm_timeout: Duration::from_secs(parse_env(vars, "LLM_TIMEOUT_SECS", "30")?),
        };
        if conversation.max_iterations == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MAX_TOOL_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        // One message can add a user turn plus a call/response pair per
        // iteration; the limit must keep that message's user turn.
        let min_history = conversation.max_iterations.saturating_mul(2).saturating_add(1);
        if conversation.history_limit < min_history {
            return Err(ConfigError::InvalidEnvVar(
                "HISTORY_LIMIT".to_string(),
                format!("must be at least {min_history} (2 * MAX_TOOL_ITERATIONS + 1)"),
            ));
        }

        let capacity = parse_env(vars, "SESSION_CAPACITY", "10000")?;
        let idle_timeout = Duration::from_secs(parse_env(vars, "SESSION_IDLE_SECS", "86400")?);
        let image_cache_ttl = Duration::from_secs(parse_env(vars, "IMAGE_CACHE_TTL_SECS", "3600")?);

        let demo_today = match get_optional_env(vars, "DEMO_TODAY") {
            Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| ConfigError::InvalidEnvVar("DEMO_TODAY".to_string(), e.to_string()))?,
            None => DEMO_TODAY,
        };

        let sentry_sample_rate = get_optional_env(vars, "SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env(vars, "SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            bot_host_url,
            line,
            llm,
            conversation,
            sessions: SessionSettings {
                capacity,
                idle_timeout,
            },
            ledger: LedgerSettings {
                max_users: capacity,
                idle_timeout,
            },
            image_cache_ttl,
            assets_dir: get_optional_env(vars, "PRODUCT_ASSETS_DIR").map(PathBuf::from),
            demo_today,
            sentry_dsn: get_optional_env(vars, "SENTRY_DSN"),
            sentry_environment: get_optional_env(vars, "SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Public URL under which a cached image is served.
    #[must_use]
    pub fn image_url(&self, id: &uuid::Uuid) -> String {
        format!("{}/images/{id}", self.bot_host_url)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(vars: &EnvVars, key: &str) -> Result<String, ConfigError> {
    get_optional_env(vars, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(vars: &EnvVars, key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(vars, key)?;
    Ok(SecretString::from(value))
}

/// Get a required secret under `key`, or under the `legacy` name.
fn get_required_secret_or(
    vars: &EnvVars,
    key: &str,
    legacy: &str,
) -> Result<SecretString, ConfigError> {
    get_optional_env(vars, key)
        .or_else(|| get_optional_env(vars, legacy))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Whether a flag variable is set to a true value (`true`, `1`, `yes`).
fn get_bool_env(vars: &EnvVars, key: &str) -> bool {
    get_optional_env(vars, key).is_some_and(|v| {
        matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
    })
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(vars: &EnvVars, key: &str) -> Option<String> {
    vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
}

/// Get an environment variable with a default value.
fn get_env_or_default(vars: &EnvVars, key: &str, default: &str) -> String {
    get_optional_env(vars, key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(vars: &EnvVars, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(vars, key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
