//! LINE Messaging API: webhook payloads, signature checks and the reply call.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::LineConfig;
use crate::platform::{InboundEvent, ReplySender};

/// Header carrying base64(HMAC-SHA256(channel secret, body)).
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// LINE rejects text messages longer than this many characters.
const MAX_TEXT_CHARS: usize = 5000;
/// A reply token can carry at most this many messages.
const MAX_MESSAGES_PER_REPLY: usize = 5;

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Signature ──────────────────────────────────────────────────────────────────

/// Check a `X-Line-Signature` value against the raw request body.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub(crate) fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

// ── Webhook payload ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    Message(MessageEvent),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Absent for events delivered in standby mode
    #[serde(default)]
    pub reply_token: Option<String>,
    pub message: MessageContent,
    #[serde(default)]
    pub source: Option<EventSource>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).context("Failed to parse LINE webhook payload")
    }

    /// Keep only the text messages that can still be replied to.
    pub fn into_inbound_events(self) -> Vec<InboundEvent> {
        let mut inbound = Vec::new();
        for event in self.events {
            let WebhookEvent::Message(message) = event else {
                debug!("Ignoring non-message webhook event");
                continue;
            };
            let MessageContent::Text { text } = message.message else {
                debug!("Ignoring non-text message event");
                continue;
            };
            let Some(reply_token) = message.reply_token else {
                debug!("Ignoring message event without a reply token");
                continue;
            };
            inbound.push(InboundEvent {
                reply_token,
                text,
                user_id: message.source.and_then(|s| s.user_id),
            });
        }
        inbound
    }
}

// ── Reply API ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

/// Split long text into chunks of at most `max_chars` characters,
/// preferring to break after a newline or a space.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let actual_end = if end < rest.len() {
            rest[..end]
                .rfind('\n')
                .or_else(|| rest[..end].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(rest[..actual_end].to_string());
        rest = &rest[actual_end..];
    }

    chunks
}

/// Client for the LINE reply endpoint.
pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    api_base_url: String,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REPLY_TIMEOUT)
            .build()
            .context("Failed to build LINE HTTP client")?;
        Ok(Self {
            client,
            access_token: config.channel_access_token.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let chunks = split_message(text, MAX_TEXT_CHARS);
        if chunks.len() > MAX_MESSAGES_PER_REPLY {
            warn!(
                "Reply split into {} messages, sending only the first {}",
                chunks.len(),
                MAX_MESSAGES_PER_REPLY
            );
        }

        let request = ReplyRequest {
            reply_token,
            messages: chunks
                .into_iter()
                .take(MAX_MESSAGES_PER_REPLY)
                .map(|text| TextMessage { kind: "text", text })
                .collect(),
        };

        let url = format!("{}/v2/bot/message/reply", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .context("Failed to send reply to LINE")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE reply API error ({}): {}", status, error_body);
        }

        Ok(())
    }
}
