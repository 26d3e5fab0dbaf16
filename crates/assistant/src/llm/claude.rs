//! Anthropic Messages API backend.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use shop_concierge_core::TurnRole;

use crate::config::LlmConfig;

use super::error::{ClaudeErrorResponse, LlmError};
use super::types::{ConversationTurn, GenerateRequest, Part, ToolCall, ToolDeclaration, ToolResponse};
use super::ChatModel;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Claude API client.
#[derive(Clone)]
pub struct ClaudeClient {
    inner: Arc<ClaudeClientInner>,
}

struct ClaudeClientInner {
    client: reqwest::Client,
    model: String,
}

impl std::fmt::Debug for ClaudeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeClient")
            .field("model", &self.inner.model)
            .finish_non_exhaustive()
    }
}

impl ClaudeClient {
    /// Create a new Claude client.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no API key, the key contains invalid
    /// header characters, or the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key = config
            .api_key()
            .ok_or_else(|| LlmError::Unauthorized("Claude requires an API key".to_string()))?;
        let mut api_key = HeaderValue::from_str(key.expose_secret())
            .map_err(|_| LlmError::Unauthorized("API key contains invalid characters".to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClaudeClientInner {
                client,
                model: config.model.clone(),
            }),
        })
    }

    /// Send one Messages API request.
    #[instrument(skip(self, request), fields(model = %self.inner.model))]
    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, LlmError> {
        let response = self
            .inner
            .client
            .post(ANTHROPIC_API_URL)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {e}")))?;

        debug!(
            response_id = %parsed.id,
            stop_reason = ?parsed.stop_reason,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Claude response received"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl ChatModel for ClaudeClient {
    fn model_name(&self) -> &str {
        &self.inner.model
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ConversationTurn, LlmError> {
        let body = MessagesRequest {
            model: &self.inner.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            system: request.system,
            messages: to_messages(request.transcript),
            tools: request.tools.iter().map(ClaudeTool::from).collect(),
        };

        let response = self.send(&body).await?;
        Ok(from_response(response))
    }
}

async fn handle_error_status(status: reqwest::StatusCode, response: reqwest::Response) -> LlmError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return LlmError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return LlmError::Unauthorized("Invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ClaudeErrorResponse>(&body) {
            Ok(api_error) => LlmError::Api {
                error_type: api_error.error.error_type,
                message: api_error.error.message,
            },
            Err(_) => LlmError::Api {
                error_type: status.to_string(),
                message: body,
            },
        },
        Err(e) => LlmError::Http(e),
    }
}

// =============================================================================
// Wire conversion
// =============================================================================

fn to_messages(transcript: &[ConversationTurn]) -> Vec<Message> {
    transcript
        .iter()
        .filter_map(|turn| {
            let content: Vec<ContentBlock> = turn.parts.iter().filter_map(to_block).collect();
            if content.is_empty() {
                return None;
            }
            let role = match turn.role {
                TurnRole::Model => "assistant",
                TurnRole::User | TurnRole::Tool => "user",
            };
            Some(Message { role, content })
        })
        .collect()
}

fn to_block(part: &Part) -> Option<ContentBlock> {
    match part {
        Part::Text(text) if text.trim().is_empty() => None,
        Part::Text(text) => Some(ContentBlock::Text { text: text.clone() }),
        Part::ToolCall(call) => Some(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: serde_json::Value::Object(call.args.clone()),
        }),
        Part::ToolResponse(response) => Some(tool_result_block(response)),
    }
}

fn tool_result_block(response: &ToolResponse) -> ContentBlock {
    let mut content = vec![ToolResultContent::Text {
        text: response.payload.to_string(),
    }];
    if let Some(image) = &response.image {
        content.push(ToolResultContent::Image {
            source: ImageSourceBlock {
                kind: "base64".to_string(),
                media_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            },
        });
    }

    ContentBlock::ToolResult {
        tool_use_id: response.call_id.clone(),
        content,
        is_error: response.is_error.then_some(true),
    }
}

fn from_response(response: MessagesResponse) -> ConversationTurn {
    let parts = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(Part::Text(text)),
            ContentBlock::ToolUse { id, name, input } => Some(Part::ToolCall(ToolCall {
                id,
                name,
                args: match input {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                },
                thought_signature: None,
            })),
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => None,
        })
        .collect();

    ConversationTurn {
        role: TurnRole::Model,
        parts,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ClaudeTool>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ToolResultContent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolResultContent {
    Text { text: String },
    Image { source: ImageSourceBlock },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageSourceBlock {
    #[serde(rename = "type")]
    kind: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

impl From<&ToolDeclaration> for ClaudeTool {
    fn from(tool: &ToolDeclaration) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    id: String,
    stop_reason: Option<StopReason>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::InlineImage;
    use serde_json::json;

    fn tool_response(image: Option<InlineImage>, is_error: bool) -> ToolResponse {
        ToolResponse {
            call_id: "toolu_01".to_string(),
            name: "get_product_details".to_string(),
            payload: json!({"status": "success", "product_id": "P001"}),
            is_error,
            image,
        }
    }

    #[test]
    fn test_tool_turn_maps_to_user_tool_result() {
        let image = InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0xFF],
        };
        let turn = ConversationTurn::tool_responses(vec![tool_response(Some(image), false)]);
        let messages = to_messages(&[turn]);

        let value = serde_json::to_value(&messages).expect("serialize");
        let message = &value[0];
        assert_eq!(message["role"], "user");

        let block = &message["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "toolu_01");
        assert!(block.get("is_error").is_none());

        let content = block["content"].as_array().expect("content array");
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        let payload: serde_json::Value =
            serde_json::from_str(content[0]["text"].as_str().expect("text")).expect("json payload");
        assert_eq!(payload["product_id"], "P001");
        assert_eq!(content[1]["type"], "image");
        assert_eq!(content[1]["source"]["type"], "base64");
        assert_eq!(content[1]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[1]["source"]["data"], "/9j/");
    }

    #[test]
    fn test_error_tool_result_sets_is_error() {
        let turn = ConversationTurn::tool_responses(vec![tool_response(None, true)]);
        let value = serde_json::to_value(to_messages(&[turn])).expect("serialize");
        let block = &value[0]["content"][0];
        assert_eq!(block["is_error"], true);
        assert_eq!(block["content"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_model_turn_maps_to_assistant() {
        let turn = ConversationTurn {
            role: TurnRole::Model,
            parts: vec![
                Part::Text("我幫您查一下".to_string()),
                Part::ToolCall(ToolCall {
                    id: "toolu_02".to_string(),
                    name: "search_products".to_string(),
                    args: json!({"description": "襯衫"})
                        .as_object()
                        .cloned()
                        .expect("object"),
                    thought_signature: None,
                }),
            ],
        };
        let value = serde_json::to_value(to_messages(&[turn])).expect("serialize");
        assert_eq!(value[0]["role"], "assistant");
        assert_eq!(value[0]["content"][1]["type"], "tool_use");
        assert_eq!(value[0]["content"][1]["input"]["description"], "襯衫");
    }

    #[test]
    fn test_empty_model_text_is_dropped() {
        let messages = to_messages(&[
            ConversationTurn::user("嗨"),
            ConversationTurn::model_text(""),
        ]);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_parse_tool_use_response() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "讓我查詢您的訂單"},
                {"type": "tool_use", "id": "toolu_03", "name": "get_order_history",
                 "input": {"time_range": "last_month"}}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 40}
        }"#;
        let response: MessagesResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));

        let turn = from_response(response);
        assert_eq!(turn.role, TurnRole::Model);
        assert_eq!(turn.text(), "讓我查詢您的訂單");

        let call = turn.tool_calls().next().expect("tool call");
        assert_eq!(call.id, "toolu_03");
        assert_eq!(call.name, "get_order_history");
        assert_eq!(call.args["time_range"], "last_month");
    }

    #[test]
    fn test_parse_ignores_unknown_blocks() {
        let body = r#"{
            "id": "msg_02",
            "stop_reason": "end_turn",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "好的"}
            ],
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }"#;
        let response: MessagesResponse = serde_json::from_str(body).expect("parse");
        let turn = from_response(response);
        assert_eq!(turn.parts.len(), 1);
        assert_eq!(turn.text(), "好的");
    }

    #[test]
    fn test_tool_declaration_serializes_as_input_schema() {
        let declaration = ToolDeclaration {
            name: "search_products".to_string(),
            description: "Search".to_string(),
            parameters: json!({"type": "object"}),
        };
        let value = serde_json::to_value(ClaudeTool::from(&declaration)).expect("serialize");
        assert_eq!(value["input_schema"]["type"], "object");
        assert!(value.get("parameters").is_none());
    }

    #[test]
    fn test_claude_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClaudeClient>();
    }
}
