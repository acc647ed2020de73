//! LINE Messaging API adapter.
//!
//! Covers the two platform touchpoints: verifying the `X-Line-Signature`
//! header on inbound webhooks, and sending replies through the Reply API.
//! LINE signs the raw request body with HMAC-SHA256 keyed by the channel
//! secret and sends the digest base64-encoded.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use relay_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Reply API text limit (characters).
const MAX_REPLY_CHARS: usize = 5000;

// ============================================================================
// Signature Verification
// ============================================================================

/// Verify a webhook signature against the raw request body.
///
/// Comparison happens inside `Mac::verify_slice`, which is constant-time.
/// Any undecodable signature fails verification rather than erroring.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };

    mac.verify_slice(&expected).is_ok()
}

// ============================================================================
// Webhook Payload Types
// ============================================================================

/// Top-level webhook request body.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// A single webhook event.
///
/// Only `message` events carrying text are dispatched; everything else
/// (stickers, images, follows, joins, ...) is ignored upstream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<String>,
}

impl WebhookEvent {
    /// Extract `(user_id, text, reply_token)` if this is a replyable
    /// text-message event.
    pub fn as_text_message(&self) -> Option<(&str, &str, &str)> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        let text = message.text.as_deref()?;
        let user_id = self.source.as_ref()?.user_id.as_deref()?;
        let reply_token = self.reply_token.as_deref()?;
        Some((user_id, text, reply_token))
    }
}

// ============================================================================
// Reply API Client
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: String,
}

/// LINE Reply API client.
pub struct LineClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl LineClient {
    /// Create a client for the given channel access token.
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Reply to a webhook event with a single text message.
    ///
    /// Reply tokens are single-use and short-lived; there is no retry.
    pub async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                message_type: "text",
                text: truncate_chars(text, MAX_REPLY_CHARS),
            }],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::External(format!("Reply API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "Reply API returned {status}: {body}"
            )));
        }

        Ok(())
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
