//! Conversation orchestration.
//!
//! This service handles the complete flow of one inbound message:
//! 1. Locking the user's session and loading their history
//! 2. Calling the chat model with the transcript and tool declarations
//! 3. Executing requested tools and feeding results (with images) back
//! 4. Saving the truncated transcript
//!
//! The last product image produced while handling the message is returned
//! with the reply text.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use shop_concierge_core::UserId;

use crate::imaging::JPEG_MIME;
use crate::llm::{
    ChatModel, ConversationTurn, GenerateRequest, InlineImage, LlmError, ToolCall,
    ToolDeclaration, ToolResponse,
};
use crate::tools::{ToolExecutor, assistant_tools};

use super::session::{SessionStore, truncate_history};

/// System instruction sent with every model call.
pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/system_prompt.txt");

/// Reply used when the model keeps calling tools past the iteration cap.
pub const FALLBACK_REPLY: &str = "抱歉，我暫時無法處理您的請求，請稍後再試。";

/// Errors that abort processing of a message.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// The chat model call failed.
    #[error("chat model error: {0}")]
    Model(#[from] LlmError),

    /// The chat model did not answer in time.
    #[error("chat model timed out after {0:?}")]
    Timeout(Duration),
}

/// Tunables for the tool-calling loop.
#[derive(Debug, Clone, Copy)]
pub struct ConversationSettings {
    /// Maximum model calls per message.
    pub max_iterations: usize,
    /// Maximum stored turns per user.
    pub history_limit: usize,
    /// Deadline for a single model call.
    pub llm_timeout: Duration,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            history_limit: 20,
            llm_timeout: Duration::from_secs(30),
        }
    }
}

/// The assistant's answer to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
    /// JPEG bytes of the last product image produced, if any.
    pub image: Option<Vec<u8>>,
}

/// Service for running conversations.
#[derive(Clone)]
pub struct ConversationService {
    model: Arc<dyn ChatModel>,
    executor: ToolExecutor,
    sessions: SessionStore,
    tools: Arc<[ToolDeclaration]>,
    settings: ConversationSettings,
}

impl std::fmt::Debug for ConversationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationService")
            .field("model", &self.model.model_name())
            .field("sessions", &self.sessions)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ConversationService {
    /// Create a new conversation service.
    #[must_use]
    pub fn new(
        model: Arc<dyn ChatModel>,
        executor: ToolExecutor,
        sessions: SessionStore,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            model,
            executor,
            sessions,
            tools: assistant_tools().into(),
            settings,
        }
    }

    /// The session store backing this service.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The tool executor backing this service.
    #[must_use]
    pub const fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Process one user message and produce the assistant's reply.
    ///
    /// Messages from the same user are serialized. History is saved when the
    /// model answers or the iteration cap is reached, never on error.
    ///
    /// # Errors
    ///
    /// Returns an error if a model call fails or times out.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn process_message(
        &self,
        text: &str,
        user_id: &UserId,
    ) -> Result<AssistantReply, ConversationError> {
        let slot = self.sessions.slot(user_id).await;
        let mut history = slot.lock().await;

        let mut transcript = history.clone();
        transcript.push(ConversationTurn::user(text));

        let mut image: Option<Vec<u8>> = None;
        let mut answer: Option<String> = None;

        for iteration in 1..=self.settings.max_iterations {
            let turn = self.generate(&transcript).await?;
            let calls: Vec<ToolCall> = turn.tool_calls().cloned().collect();
            let reply_text = turn.text();
            transcript.push(turn);

            if calls.is_empty() {
                debug!(iteration, "Model answered without tool calls");
                answer = Some(reply_text);
                break;
            }

            debug!(iteration, tool_calls = calls.len(), "Executing tool calls");
            let responses = calls
                .iter()
                .map(|call| self.run_tool(call, user_id, &mut image))
                .collect();
            transcript.push(ConversationTurn::tool_responses(responses));
        }

        let text = answer.unwrap_or_else(|| {
            warn!(
                max_iterations = self.settings.max_iterations,
                "Tool iteration limit reached, using fallback reply"
            );
            FALLBACK_REPLY.to_string()
        });

        *history = truncate_history(transcript, self.settings.history_limit);

        info!(
            stored_turns = history.len(),
            has_image = image.is_some(),
            "Message processed"
        );

        Ok(AssistantReply { text, image })
    }

    async fn generate(
        &self,
        transcript: &[ConversationTurn],
    ) -> Result<ConversationTurn, ConversationError> {
        let request = GenerateRequest {
            system: SYSTEM_PROMPT,
            transcript,
            tools: &self.tools,
        };

        let timeout = self.settings.llm_timeout;
        let turn = tokio::time::timeout(timeout, self.model.generate(request))
            .await
            .map_err(|_| ConversationError::Timeout(timeout))??;
        Ok(turn)
    }

    fn run_tool(
        &self,
        call: &ToolCall,
        user_id: &UserId,
        last_image: &mut Option<Vec<u8>>,
    ) -> ToolResponse {
        let execution = self.executor.execute(&call.name, &call.args, user_id);

        let inline = execution.image.map(|bytes| {
            *last_image = Some(bytes.clone());
            InlineImage {
                mime_type: JPEG_MIME.to_string(),
                data: bytes,
            }
        });

        ToolResponse {
            call_id: call.id.clone(),
            name: call.name.clone(),
            payload: execution.result.to_json(),
            is_error: execution.result.is_error(),
            image: inline,
        }
    }
}
