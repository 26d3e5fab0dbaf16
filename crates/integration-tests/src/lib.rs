//! Integration tests for Shop Concierge.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shop-concierge-integration-tests
//! ```
//!
//! No external network access is needed: the chat model is replaced by
//! [`ScriptedModel`], and the LINE reply API by a local `wiremock` server
//! (see [`test_config_with_line_api`]).
//!
//! # Test Categories
//!
//! - `conversation` - Tool-calling loop over the demo catalog
//! - `http_routes` - Webhook verification and replies, image serving, health checks

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use shop_concierge_assistant::catalog::{Catalog, DEMO_TODAY, LedgerSettings, OrderLedger};
use shop_concierge_assistant::config::{AssistantConfig, EnvVars};
use shop_concierge_assistant::imaging::ProductImages;
use shop_concierge_assistant::llm::{
    ChatModel, ConversationTurn, GenerateRequest, LlmError, Part, ToolCall,
};
use shop_concierge_assistant::services::{
    ConversationService, ConversationSettings, SessionSettings, SessionStore,
};
use shop_concierge_assistant::tools::ToolExecutor;
use shop_concierge_core::TurnRole;

/// Channel secret used by [`test_config`].
pub const TEST_CHANNEL_SECRET: &str = "integration-channel-secret";

/// What a [`ScriptedModel`] was asked.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// Transcript sent with the request.
    pub transcript: Vec<ConversationTurn>,
    /// Names of the declared tools.
    pub tools: Vec<String>,
}

/// Chat model that replays canned turns.
///
/// Once the script runs out it answers with plain text.
#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Result<ConversationTurn, LlmError>>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedModel {
    /// Model that plays back `turns` in order.
    #[must_use]
    pub fn new(turns: Vec<Result<ConversationTurn, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ConversationTurn, LlmError> {
        self.seen.lock().expect("seen lock").push(SeenRequest {
            transcript: request.transcript.to_vec(),
            tools: request.tools.iter().map(|t| t.name.clone()).collect(),
        });
        self.turns
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(ConversationTurn::model_text("好的")))
    }
}

/// A model turn requesting one tool call.
#[must_use]
pub fn call_turn(id: &str, name: &str, args: serde_json::Value) -> ConversationTurn {
    ConversationTurn {
        role: TurnRole::Model,
        parts: vec![Part::ToolCall(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
            thought_signature: None,
        })],
    }
}

/// Conversation service over the demo catalog with default settings.
#[must_use]
pub fn demo_service(model: Arc<dyn ChatModel>) -> ConversationService {
    demo_service_with(model, ConversationSettings::default())
}

/// Conversation service over the demo catalog.
#[must_use]
pub fn demo_service_with(
    model: Arc<dyn ChatModel>,
    settings: ConversationSettings,
) -> ConversationService {
    let executor = ToolExecutor::new(
        Arc::new(Catalog::demo()),
        OrderLedger::demo(LedgerSettings::default()),
        ProductImages::default(),
        DEMO_TODAY,
    );
    ConversationService::new(
        model,
        executor,
        SessionStore::new(SessionSettings::default()),
        settings,
    )
}

/// Channel access token used by [`test_config`].
pub const TEST_ACCESS_TOKEN: &str = "integration-access-token";

/// Server configuration that needs no real credentials.
#[must_use]
pub fn test_config() -> AssistantConfig {
    config_from(&[])
}

/// [`test_config`] with the LINE reply API at `line_api_base`.
#[must_use]
pub fn test_config_with_line_api(line_api_base: &str) -> AssistantConfig {
    config_from(&[("LINE_API_BASE", line_api_base)])
}

fn config_from(extra: &[(&str, &str)]) -> AssistantConfig {
    let vars: EnvVars = [
        ("BOT_HOST_URL", "https://bot.example/"),
        ("LINE_CHANNEL_SECRET", TEST_CHANNEL_SECRET),
        ("LINE_CHANNEL_ACCESS_TOKEN", TEST_ACCESS_TOKEN),
        ("CLAUDE_API_KEY", "integration-llm-key"),
    ]
    .iter()
    .chain(extra)
    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
    .collect();
    AssistantConfig::from_vars(&vars).expect("test config")
}

/// Signature LINE would send for `body` under `secret`.
#[must_use]
pub fn line_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("valid key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
