//! Gemini backend.
//!
//! Talks to either the Generative Language API (API key) or Vertex AI
//! (OAuth bearer token). Both accept the same `generateContent` body.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use shop_concierge_core::TurnRole;

use crate::config::{LlmConfig, LlmCredentials, VertexConfig};

use super::error::{GeminiErrorResponse, LlmError};
use super::google_auth::GoogleTokens;
use super::types::{ConversationTurn, GenerateRequest, Part, ToolCall, ToolDeclaration, ToolResponse};
use super::ChatModel;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    auth: GeminiAuth,
    /// Base URL up to and including `models`.
    models_url: String,
    model: String,
}

enum GeminiAuth {
    ApiKey(SecretString),
    Vertex(GoogleTokens),
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.inner.model)
            .field("models_url", &self.inner.models_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// With Vertex credentials the token source is resolved here; no token
    /// is fetched until the first call.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the Vertex
    /// credentials file is unusable.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().build()?;

        let (auth, models_url) = match &config.credentials {
            LlmCredentials::ApiKey(key) => {
                (GeminiAuth::ApiKey(key.clone()), GEMINI_API_BASE.to_string())
            }
            LlmCredentials::Vertex(vertex) => (
                GeminiAuth::Vertex(GoogleTokens::new(client.clone(), vertex)?),
                vertex_models_url(vertex),
            ),
        };

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                auth,
                models_url,
                model: config.model.clone(),
            }),
        })
    }

    fn endpoint(&self) -> String {
        let model = self.inner.model.trim_start_matches("models/");
        format!("{}/{model}:generateContent", self.inner.models_url)
    }

    #[instrument(skip(self, request), fields(model = %self.inner.model))]
    async fn send(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse, LlmError> {
        let builder = match &self.inner.auth {
            GeminiAuth::ApiKey(key) => {
                let url = Url::parse_with_params(&self.endpoint(), &[("key", key.expose_secret())])
                    .map_err(|e| LlmError::Parse(format!("Invalid endpoint: {e}")))?;
                self.inner.client.post(url)
            }
            GeminiAuth::Vertex(tokens) => {
                let token = tokens.token().await?;
                self.inner
                    .client
                    .post(self.endpoint())
                    .bearer_auth(token.expose_secret())
            }
        };

        // reqwest errors carry the URL, which may include the key.
        let response = builder
            .json(request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.inner.model
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ConversationTurn, LlmError> {
        let body = GenerateContentRequest {
            contents: to_contents(request.transcript),
            system_instruction: Some(Content {
                role: None,
                parts: vec![GeminiPart::text(request.system)],
            }),
            tools: if request.tools.is_empty() {
                Vec::new()
            } else {
                vec![ToolGroup {
                    function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
                }]
            },
        };

        let response = self.send(&body).await?;
        from_response(response)
    }
}

/// Vertex AI publisher model path for the configured project and region.
fn vertex_models_url(vertex: &VertexConfig) -> String {
    let host = if vertex.location == "global" {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{}-aiplatform.googleapis.com", vertex.location)
    };
    format!(
        "https://{host}/v1/projects/{}/locations/{}/publishers/google/models",
        vertex.project, vertex.location
    )
}

fn error_from_body(status: reqwest::StatusCode, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<GeminiErrorResponse>(body).ok();

    match status {
        reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(60),
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => LlmError::Unauthorized(
            parsed.map_or_else(|| "Invalid API key".to_string(), |e| e.error.message),
        ),
        _ => match parsed {
            Some(e) => LlmError::Api {
                error_type: e.error.status.unwrap_or_else(|| e.error.code.to_string()),
                message: e.error.message,
            },
            None => LlmError::Api {
                error_type: status.to_string(),
                message: body.to_string(),
            },
        },
    }
}

// =============================================================================
// Wire conversion
// =============================================================================

fn to_contents(transcript: &[ConversationTurn]) -> Vec<Content> {
    transcript
        .iter()
        .filter_map(|turn| {
            let parts: Vec<GeminiPart> = turn.parts.iter().filter_map(to_part).collect();
            if parts.is_empty() {
                return None;
            }
            let role = match turn.role {
                TurnRole::Model => "model",
                TurnRole::User | TurnRole::Tool => "user",
            };
            Some(Content {
                role: Some(role.to_string()),
                parts,
            })
        })
        .collect()
}

fn to_part(part: &Part) -> Option<GeminiPart> {
    match part {
        Part::Text(text) if text.is_empty() => None,
        Part::Text(text) => Some(GeminiPart::text(text)),
        Part::ToolCall(call) => Some(GeminiPart {
            function_call: Some(FunctionCall {
                name: call.name.clone(),
                args: serde_json::Value::Object(call.args.clone()),
            }),
            thought_signature: call.thought_signature.clone(),
            ..GeminiPart::default()
        }),
        Part::ToolResponse(response) => Some(GeminiPart {
            function_response: Some(function_response(response)),
            ..GeminiPart::default()
        }),
    }
}

fn function_response(response: &ToolResponse) -> FunctionResponse {
    let parts = response
        .image
        .iter()
        .map(|image| FunctionResponsePart {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            },
        })
        .collect();

    FunctionResponse {
        name: response.name.clone(),
        response: response.payload.clone(),
        parts,
    }
}

fn from_response(response: GenerateContentResponse) -> Result<ConversationTurn, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(LlmError::EmptyResponse(reason));
    };

    let Some(content) = candidate.content else {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "no content".to_string());
        return Err(LlmError::EmptyResponse(reason));
    };

    debug!(
        finish_reason = candidate.finish_reason.as_deref().unwrap_or("none"),
        parts = content.parts.len(),
        "Gemini response received"
    );

    let mut call_index = 0usize;
    let parts = content
        .parts
        .into_iter()
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                call_index += 1;
                return Some(Part::ToolCall(ToolCall {
                    id: format!("call_{call_index}"),
                    name: call.name,
                    args: match call.args {
                        serde_json::Value::Object(map) => map,
                        _ => serde_json::Map::new(),
                    },
                    thought_signature: part.thought_signature,
                }));
            }
            match part.thought {
                Some(true) => None,
                _ => part.text.map(Part::Text),
            }
        })
        .collect();

    Ok(ConversationTurn {
        role: TurnRole::Model,
        parts,
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parts: Vec<FunctionResponsePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionResponsePart {
    inline_data: InlineData,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolGroup {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDeclaration> for FunctionDeclaration {
    fn from(tool: &ToolDeclaration) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
