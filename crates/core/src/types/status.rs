//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Serialized with the customer-facing Traditional Chinese labels, which is
/// what the model sees in tool payloads and repeats back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "處理中")]
    Processing,
    #[serde(rename = "已出貨")]
    Shipped,
    #[serde(rename = "已送達")]
    Delivered,
    #[serde(rename = "已取消")]
    Cancelled,
}

impl OrderStatus {
    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Processing => "處理中",
            Self::Shipped => "已出貨",
            Self::Delivered => "已送達",
            Self::Cancelled => "已取消",
        }
    }
}

/// Role of a conversation turn exchanged with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// Text from the end user.
    User,
    /// Model output: text and/or tool-call requests.
    Model,
    /// Results of locally executed tool calls.
    Tool,
}

impl TurnRole {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Tool => "tool",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serializes_label() {
        let json = serde_json::to_string(&OrderStatus::Delivered).expect("serialize");
        assert_eq!(json, "\"已送達\"");
        assert_eq!(OrderStatus::Delivered.label(), "已送達");
    }

    #[test]
    fn test_turn_role_serialization() {
        let json = serde_json::to_string(&TurnRole::Tool).expect("serialize");
        assert_eq!(json, "\"tool\"");
        let role: TurnRole = serde_json::from_str("\"model\"").expect("deserialize");
        assert_eq!(role, TurnRole::Model);
        assert_eq!(role.as_str(), "model");
    }
}
