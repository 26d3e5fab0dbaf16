//! Per-user conversation history.
//!
//! Each user owns one slot: an async mutex around their history. The
//! conversation service holds the lock for a whole message, so messages from
//! the same user are processed one at a time while different users run
//! concurrently.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;

use shop_concierge_core::UserId;

use crate::llm::ConversationTurn;

/// A user's history behind its lock.
pub type SessionSlot = Arc<Mutex<Vec<ConversationTurn>>>;

/// Eviction limits for stored histories.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Maximum number of users with a stored history.
    pub capacity: u64,
    /// Forget a history after this long without access.
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            idle_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Store of per-user conversation histories.
#[derive(Clone)]
pub struct SessionStore {
    slots: Cache<UserId, SessionSlot>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.slots.entry_count())
            .finish()
    }
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        let slots = Cache::builder()
            .max_capacity(settings.capacity)
            .time_to_idle(settings.idle_timeout)
            .build();
        Self { slots }
    }

    /// The user's slot, created empty on first use.
    pub async fn slot(&self, user_id: &UserId) -> SessionSlot {
        self.slots
            .get_with_by_ref(user_id, async { Arc::new(Mutex::new(Vec::new())) })
            .await
    }

    /// Snapshot of the user's stored history.
    pub async fn history(&self, user_id: &UserId) -> Vec<ConversationTurn> {
        let Some(slot) = self.slots.get(user_id).await else {
            return Vec::new();
        };
        slot.lock().await.clone()
    }
}

/// Keep the most recent `limit` turns, then drop leading turns until the
/// history starts with a user text turn.
#[must_use]
pub fn truncate_history(mut turns: Vec<ConversationTurn>, limit: usize) -> Vec<ConversationTurn> {
    if turns.len() > limit {
        let excess = turns.len() - limit;
        turns.drain(..excess);
    }

    let start = turns
        .iter()
        .position(ConversationTurn::is_user_text)
        .unwrap_or(turns.len());
    turns.drain(..start);
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Part, ToolCall, ToolResponse};
    use shop_concierge_core::TurnRole;

    fn tool_exchange() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn {
                role: TurnRole::Model,
                parts: vec![Part::ToolCall(ToolCall {
                    id: "call_1".to_string(),
                    name: "search_products".to_string(),
                    args: serde_json::Map::new(),
                    thought_signature: None,
                })],
            },
            ConversationTurn::tool_responses(vec![ToolResponse {
                call_id: "call_1".to_string(),
                name: "search_products".to_string(),
                payload: serde_json::json!({"status": "success"}),
                is_error: false,
                image: None,
            }]),
        ]
    }

    #[test]
    fn test_truncate_keeps_short_history() {
        let turns = vec![
            ConversationTurn::user("嗨"),
            ConversationTurn::model_text("您好！"),
        ];
        assert_eq!(truncate_history(turns.clone(), 20), turns);
    }

    #[test]
    fn test_truncate_bounds_length() {
        let turns: Vec<_> = (0..30)
            .flat_map(|i| {
                [
                    ConversationTurn::user(format!("問題 {i}")),
                    ConversationTurn::model_text(format!("回答 {i}")),
                ]
            })
            .collect();

        let kept = truncate_history(turns, 20);
        assert_eq!(kept.len(), 20);
        assert_eq!(kept.first().map(ConversationTurn::text).as_deref(), Some("問題 20"));
    }

    #[test]
    fn test_truncate_never_starts_with_tool_turn() {
        let mut turns = vec![ConversationTurn::user("查訂單")];
        turns.extend(tool_exchange());
        turns.push(ConversationTurn::model_text("您有兩筆訂單"));
        turns.push(ConversationTurn::user("謝謝"));
        turns.push(ConversationTurn::model_text("不客氣"));

        // Cutting to 4 would start at the tool response.
        let kept = truncate_history(turns, 4);
        assert!(kept.len() <= 4);
        assert!(kept.first().is_some_and(ConversationTurn::is_user_text));
        assert_eq!(kept.len(), 2);
    }

    #[tokio::test]
    async fn test_slot_is_shared_per_user() {
        let store = SessionStore::new(SessionSettings::default());
        let user = UserId::new("U1");

        store
            .slot(&user)
            .await
            .lock()
            .await
            .push(ConversationTurn::user("hello"));

        assert_eq!(store.history(&user).await.len(), 1);
        assert!(store.history(&UserId::new("U2")).await.is_empty());
    }

    #[tokio::test]
    async fn test_slot_serializes_same_user() {
        let store = SessionStore::new(SessionSettings::default());
        let user = UserId::new("U1");

        let slot = store.slot(&user).await;
        let guard = slot.lock().await;

        let again = store.slot(&user).await;
        assert!(Arc::ptr_eq(&slot, &again));
        assert!(again.try_lock().is_err());
        drop(guard);
        assert!(again.try_lock().is_ok());
    }
}
