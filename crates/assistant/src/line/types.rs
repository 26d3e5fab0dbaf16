//! LINE webhook and reply message types.
//!
//! Only the parts of the webhook schema the assistant acts on are modeled;
//! everything else deserializes into `Other` variants and is ignored.

use serde::{Deserialize, Serialize};

use shop_concierge_core::UserId;

use super::LineError;

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Webhook request body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    /// Bot user ID the events were sent to.
    #[serde(default)]
    pub destination: Option<String>,
    /// Events in delivery order.
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

impl WebhookBody {
    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a valid webhook payload.
    pub fn parse(body: &[u8]) -> Result<Self, LineError> {
        serde_json::from_slice(body).map_err(|e| LineError::InvalidPayload(e.to_string()))
    }

    /// Text messages from identifiable users, in delivery order.
    #[must_use]
    pub fn text_messages(self) -> Vec<TextMessage> {
        self.events
            .into_iter()
            .filter_map(|event| match event {
                WebhookEvent::Message(MessageEvent {
                    reply_token,
                    source: Source {
                        user_id: Some(user_id),
                        ..
                    },
                    message: EventMessage::Text { text, .. },
                }) => Some(TextMessage {
                    reply_token,
                    user_id: UserId::new(user_id),
                    text,
                }),
                _ => None,
            })
            .collect()
    }
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    /// A user sent a message.
    Message(MessageEvent),
    /// Follow, unfollow, postback and everything else.
    #[serde(other)]
    Other,
}

/// Payload of a `message` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub reply_token: String,
    pub source: Source,
    pub message: EventMessage,
}

/// Where an event came from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// `user`, `group` or `room`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Message content of a `message` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventMessage {
    /// A text message.
    Text {
        /// Message ID.
        id: String,
        /// Message text.
        text: String,
    },
    /// Stickers, images, locations and other content.
    #[serde(other)]
    Other,
}

/// A text message extracted from a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub reply_token: String,
    pub user_id: UserId,
    pub text: String,
}

/// A message sent through the reply API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// Image fetched by LINE from a public URL.
    #[serde(rename_all = "camelCase")]
    Image {
        /// Full-size image URL.
        original_content_url: String,
        /// Preview image URL.
        preview_image_url: String,
    },
}

impl ReplyMessage {
    /// A text message, truncated to LINE's length limit.
    #[must_use]
    pub fn text(text: &str) -> Self {
        let text = match text.char_indices().nth(MAX_TEXT_CHARS) {
            Some((cut, _)) => text.get(..cut).unwrap_or(text).to_string(),
            None => text.to_string(),
        };
        Self::Text { text }
    }

    /// An image message using the same URL for original and preview.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::Image {
            original_content_url: url.clone(),
            preview_image_url: url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "destination": "U0bot",
        "events": [
            {
                "type": "message",
                "replyToken": "reply-1",
                "source": {"type": "user", "userId": "U111"},
                "timestamp": 1700000000000,
                "mode": "active",
                "message": {"type": "text", "id": "m1", "text": "有藍色襯衫嗎？"}
            },
            {
                "type": "message",
                "replyToken": "reply-2",
                "source": {"type": "user", "userId": "U222"},
                "message": {"type": "sticker", "id": "m2", "packageId": "1", "stickerId": "2"}
            },
            {
                "type": "follow",
                "replyToken": "reply-3",
                "source": {"type": "user", "userId": "U333"}
            },
            {
                "type": "message",
                "replyToken": "reply-4",
                "source": {"type": "group", "groupId": "G1"},
                "message": {"type": "text", "id": "m4", "text": "hi"}
            }
        ]
    }"#;

    #[test]
    fn test_only_user_text_messages_are_extracted() {
        let body = WebhookBody::parse(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(body.events.len(), 4);

        let messages = body.text_messages();
        assert_eq!(
            messages,
            vec![TextMessage {
                reply_token: "reply-1".to_string(),
                user_id: UserId::new("U111"),
                text: "有藍色襯衫嗎？".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_verification_body() {
        let body = WebhookBody::parse(br#"{"destination": "U0bot", "events": []}"#).expect("parse");
        assert!(body.text_messages().is_empty());
    }

    #[test]
    fn test_invalid_body() {
        let result = WebhookBody::parse(b"not json");
        assert!(matches!(result, Err(LineError::InvalidPayload(_))));
    }

    #[test]
    fn test_reply_message_serialization() {
        let text = serde_json::to_value(ReplyMessage::text("您好")).expect("serialize");
        assert_eq!(text, serde_json::json!({"type": "text", "text": "您好"}));

        let image = serde_json::to_value(ReplyMessage::image("https://bot.example/images/abc"))
            .expect("serialize");
        assert_eq!(
            image,
            serde_json::json!({
                "type": "image",
                "originalContentUrl": "https://bot.example/images/abc",
                "previewImageUrl": "https://bot.example/images/abc"
            })
        );
    }

    #[test]
    fn test_text_is_truncated_by_characters() {
        let long = "字".repeat(MAX_TEXT_CHARS + 10);
        let ReplyMessage::Text { text } = ReplyMessage::text(&long) else {
            panic!("expected text message");
        };
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);

        let ReplyMessage::Text { text } = ReplyMessage::text("short") else {
            panic!("expected text message");
        };
        assert_eq!(text, "short");
    }
}
