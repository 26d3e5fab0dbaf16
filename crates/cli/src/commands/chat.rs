//! Interactive chat through the full conversation loop.
//!
//! Each stdin line is one user message. Replies are logged; reply pictures
//! are written to the image directory as `reply-<n>.jpg`.
//!
//! # Environment Variables
//!
//! - `LLM_PROVIDER` - `claude`, `gemini` or `vertex` (optional)
//! - `CLAUDE_API_KEY` / `GOOGLE_API_KEY` - Chat model credential
//! - `GOOGLE_GENAI_USE_VERTEXAI` / `GOOGLE_CLOUD_PROJECT` - Vertex AI via
//!   Application Default Credentials
//! - `CLAUDE_MODEL` / `GEMINI_MODEL` - Model override (optional)

use std::path::Path;

use shop_concierge_assistant::config::{ConfigError, LlmConfig};
use shop_concierge_assistant::llm::{LlmError, build_model};
use shop_concierge_assistant::services::{
    ConversationService, ConversationSettings, SessionSettings, SessionStore,
};
use shop_concierge_core::UserId;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Errors that can end a chat session.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Chat model configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The chat model client could not be built.
    #[error("Chat model error: {0}")]
    Model(#[from] LlmError),

    /// Reading stdin or writing a picture failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat as `user` until stdin closes.
pub async fn run(user: &str, image_dir: &Path) -> Result<(), ChatError> {
    let llm = LlmConfig::from_env()?;
    tracing::info!("Chatting with {} ({})", llm.model, llm.provider);

    let service = ConversationService::new(
        build_model(&llm)?,
        super::demo_executor(),
        SessionStore::new(SessionSettings::default()),
        ConversationSettings::default(),
    );
    let user_id = UserId::new(user);

    std::fs::create_dir_all(image_dir)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pictures = 0_u32;

    tracing::info!("Type a message and press enter; Ctrl+D to quit");
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match service.process_message(text, &user_id).await {
            Ok(reply) => {
                tracing::info!("assistant: {}", reply.text);
                if let Some(bytes) = reply.image {
                    pictures += 1;
                    let path = image_dir.join(format!("reply-{pictures}.jpg"));
                    std::fs::write(&path, &bytes)?;
                    tracing::info!("picture: {}", path.display());
                }
            }
            // Keep the session going; nothing was saved for this turn
            Err(e) => tracing::error!("Message failed: {e}"),
        }
    }

    Ok(())
}
