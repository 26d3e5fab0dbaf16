//! Provider-neutral conversation types.
//!
//! The orchestrator builds its transcript from these types; each backend maps
//! them onto its own wire format. Tool responses carry an optional inline
//! image as a typed field, so any tool-calling API that accepts structured
//! function responses with attachments can carry it.

use serde::{Deserialize, Serialize};

use shop_concierge_core::TurnRole;

/// One role-tagged unit of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced the turn.
    pub role: TurnRole,
    /// Ordered content parts.
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    /// A user text turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A model turn containing only text.
    #[must_use]
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// A tool turn answering one or more calls.
    #[must_use]
    pub fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        Self {
            role: TurnRole::Tool,
            parts: responses.into_iter().map(Part::ToolResponse).collect(),
        }
    }

    /// Tool calls requested in this turn, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|part| match part {
            Part::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    /// Concatenation of all text parts (empty if there are none).
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether this is a user turn made of text only.
    #[must_use]
    pub fn is_user_text(&self) -> bool {
        self.role == TurnRole::User && self.parts.iter().all(|p| matches!(p, Part::Text(_)))
    }
}

/// A content part within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Free text.
    Text(String),
    /// A tool invocation requested by the model.
    ToolCall(ToolCall),
    /// The result of a tool invocation.
    ToolResponse(ToolResponse),
}

/// A structured tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier (provider-issued or synthesized).
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Argument object.
    pub args: serde_json::Map<String, serde_json::Value>,
    /// Opaque reasoning signature that must be echoed back with the call
    /// (Gemini 2.5+).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

/// The answer to a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// ID of the call being answered.
    pub call_id: String,
    /// Name of the tool that ran.
    pub name: String,
    /// Structured result payload (always a JSON object with `status`).
    pub payload: serde_json::Value,
    /// Whether the payload reports an error.
    pub is_error: bool,
    /// Optional picture attached to the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
}

/// Inline binary attachment.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    /// MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name.
    pub name: String,
    /// What the tool does (shown to the model).
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: serde_json::Value,
}

/// Everything a backend needs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// System instruction.
    pub system: &'a str,
    /// Transcript so far, oldest first.
    pub transcript: &'a [ConversationTurn],
    /// Declared tools.
    pub tools: &'a [ToolDeclaration],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str) -> Part {
        Part::ToolCall(ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            args: serde_json::Map::new(),
            thought_signature: None,
        })
    }

    #[test]
    fn test_text_concatenates_text_parts_only() {
        let turn = ConversationTurn {
            role: TurnRole::Model,
            parts: vec![
                Part::Text("您好，".to_string()),
                call("search_products"),
                Part::Text("請稍候".to_string()),
            ],
        };
        assert_eq!(turn.text(), "您好，請稍候");
        assert_eq!(turn.tool_calls().count(), 1);
    }

    #[test]
    fn test_text_turn_has_no_tool_calls() {
        let turn = ConversationTurn::model_text("好的！");
        assert_eq!(turn.tool_calls().count(), 0);
        assert_eq!(turn.text(), "好的！");
    }

    #[test]
    fn test_is_user_text() {
        assert!(ConversationTurn::user("你好").is_user_text());
        assert!(!ConversationTurn::model_text("你好").is_user_text());
        assert!(!ConversationTurn::tool_responses(vec![]).is_user_text());
    }

    #[test]
    fn test_inline_image_debug_omits_bytes() {
        let image = InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8, 0x00],
        };
        let debug = format!("{image:?}");
        assert!(debug.contains("bytes: 3"));
        assert!(!debug.contains("255"));
    }
}
