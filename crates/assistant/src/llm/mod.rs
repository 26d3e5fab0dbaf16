//! Chat model backends.
//!
//! The conversation service talks to a [`ChatModel`]; concrete backends
//! translate the provider-neutral transcript in [`types`] to and from their
//! wire formats.
//!
//! # Backends
//!
//! - [`ClaudeClient`]: Anthropic Messages API. Tool results become
//!   `tool_result` blocks whose content carries the JSON payload as text plus
//!   a base64 image block when a product picture is attached.
//! - [`GeminiClient`]: Google Generative Language API, or Vertex AI with
//!   Application Default Credentials. Tool results become
//!   `functionResponse` parts with the picture nested as `inlineData`.

mod claude;
mod error;
mod gemini;
mod google_auth;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use claude::ClaudeClient;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use types::{
    ConversationTurn, GenerateRequest, InlineImage, Part, ToolCall, ToolDeclaration, ToolResponse,
};

use crate::config::{LlmConfig, LlmProvider};

/// A tool-calling chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, used in logs.
    fn model_name(&self) -> &str;

    /// Generate the next model turn for `request`.
    ///
    /// The returned turn has role `model` and contains text parts, tool call
    /// parts, or both.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ConversationTurn, LlmError>;
}

/// Build the backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed or the
/// credentials do not suit the provider.
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    let model: Arc<dyn ChatModel> = match config.provider {
        LlmProvider::Claude => Arc::new(ClaudeClient::new(config)?),
        LlmProvider::Gemini | LlmProvider::Vertex => Arc::new(GeminiClient::new(config)?),
    };
    tracing::info!(
        provider = %config.provider,
        model = model.model_name(),
        "Chat model configured"
    );
    Ok(model)
}
