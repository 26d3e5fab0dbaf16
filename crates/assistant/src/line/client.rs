//! LINE Messaging API client.
//!
//! Provides the reply call and webhook signature verification.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, error, instrument};

use crate::config::LineConfig;

use super::error::LineError;
use super::types::ReplyMessage;

/// Default LINE Messaging API base URL.
pub const LINE_API_BASE: &str = "https://api.line.me/v2/bot";

/// LINE API client for replying to webhook events.
#[derive(Clone)]
pub struct LineClient {
    /// HTTP client.
    client: Client,
    /// Messaging API base URL.
    api_base: String,
    /// Channel access token for the reply API.
    channel_access_token: SecretString,
    /// Channel secret for verifying webhooks.
    channel_secret: SecretString,
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("api_base", &self.api_base)
            .field("channel_access_token", &"[REDACTED]")
            .field("channel_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl LineClient {
    /// Create a new LINE client.
    #[must_use]
    pub fn new(config: &LineConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            channel_access_token: config.channel_access_token.clone(),
            channel_secret: config.channel_secret.clone(),
        }
    }

    /// Reply to an event using its reply token.
    ///
    /// Reply tokens are single-use and short-lived, so failures are not
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or LINE returns an error.
    #[instrument(skip(self, reply_token, messages), fields(messages = messages.len()))]
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<(), LineError> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ReplyRequest<'a> {
            reply_token: &'a str,
            messages: Vec<ReplyMessage>,
        }

        let request = ReplyRequest {
            reply_token,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/message/reply", self.api_base))
            .bearer_auth(self.channel_access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| LineError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            error!(status = %status, %message, "LINE API error sending reply");
            return Err(LineError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Reply sent to LINE");

        Ok(())
    }

    /// Verify a LINE webhook signature.
    ///
    /// The signature is the base64-encoded HMAC-SHA256 of the raw request
    /// body, keyed with the channel secret:
    /// <https://developers.line.biz/en/docs/messaging-api/receiving-messages/#verify-webhook-signature>
    ///
    /// # Errors
    ///
    /// Returns error if signature verification fails.
    #[instrument(skip(self, body, signature))]
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), LineError> {
        let expected = BASE64
            .decode(signature.trim())
            .map_err(|_| LineError::InvalidSignature("Signature is not base64".to_string()))?;

        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.channel_secret.expose_secret().as_bytes())
                .map_err(|e| LineError::InvalidSignature(e.to_string()))?;
        mac.update(body);

        // Constant-time comparison
        mac.verify_slice(&expected)
            .map_err(|_| LineError::InvalidSignature("Signature mismatch".to_string()))?;

        debug!("LINE signature verified");

        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Compute the signature LINE would send for `body`.
#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("valid key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
