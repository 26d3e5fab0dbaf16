//! LINE webhook handler.
//!
//! Verifies the request, acknowledges it immediately and answers each text
//! message on its own task through the reply API.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, report_user_error};
use crate::line::{ReplyMessage, TextMessage, WebhookBody};
use crate::services::AssistantReply;
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Reply sent when the conversation loop fails.
pub const ERROR_REPLY: &str = "抱歉，系統發生錯誤，請稍後再試。";

/// Create LINE webhook routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/callback", post(handle_webhook))
        .route("/", post(handle_webhook))
}

/// Handle a LINE webhook delivery.
///
/// Responds `OK` once the signature checks out and the body parses; replies
/// are sent asynchronously so slow model calls never delay the
/// acknowledgement.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature header".into()))?;

    state.line().verify_signature(&body, signature)?;

    let webhook = WebhookBody::parse(&body)?;
    let event_count = webhook.events.len();
    let messages = webhook.text_messages();

    debug!(
        events = event_count,
        text_messages = messages.len(),
        "Webhook received"
    );

    for message in messages {
        state.spawn_reply(answer_message(state.clone(), message));
    }

    Ok("OK")
}

/// Run the conversation for one text message and send the reply.
#[instrument(skip_all, fields(user_id = %message.user_id))]
async fn answer_message(state: AppState, message: TextMessage) {
    let reply = match state
        .conversation()
        .process_message(&message.text, &message.user_id)
        .await
    {
        Ok(reply) => reply_messages(&state, reply).await,
        Err(e) => {
            report_user_error(&e, &message.user_id, "Failed to process LINE message");
            vec![ReplyMessage::text(ERROR_REPLY)]
        }
    };

    if reply.is_empty() {
        warn!("Assistant produced an empty reply, nothing sent");
        return;
    }

    match state.line().reply(&message.reply_token, reply).await {
        Ok(()) => info!("Replied to LINE message"),
        Err(e) => report_user_error(&e, &message.user_id, "Failed to send LINE reply"),
    }
}

/// Turn an assistant reply into LINE messages.
///
/// The image, when present, is cached and sent by URL after the text. Empty
/// text is skipped since LINE rejects empty text messages.
async fn reply_messages(state: &AppState, reply: AssistantReply) -> Vec<ReplyMessage> {
    let mut messages = Vec::with_capacity(2);

    if !reply.text.is_empty() {
        messages.push(ReplyMessage::text(&reply.text));
    }

    if let Some(bytes) = reply.image {
        let id = state.images().insert(bytes).await;
        let url = state.config().image_url(&id);
        debug!(%url, "Attaching product image");
        messages.push(ReplyMessage::image(url));
    }

    messages
}
