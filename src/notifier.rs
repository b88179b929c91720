//! Notification delivery.
//!
//! The pipeline hands each non-empty [`NotificationBatch`] to a [`Notifier`]
//! exactly once per cycle. [`WebhookNotifier`] posts it to a Discord-style
//! webhook as a single embed.

use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::message::{MailMessage, NotificationBatch};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Most fields a single embed may carry.
const MAX_EMBED_FIELDS: usize = 25;

/// Longest allowed embed field name.
const MAX_FIELD_NAME_CHARS: usize = 256;

/// Longest allowed embed field value.
const MAX_FIELD_VALUE_CHARS: usize = 1024;

/// Longest allowed embed description.
const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Combined title, description, field names and values of one embed.
const MAX_EMBED_CHARS: usize = 6000;

/// Room kept for the "…and N more" line, whatever N is.
const OVERFLOW_NOTE_CHARS: usize = 32;

/// How much of an error response body is kept in [`Error::WebhookStatus`].
const MAX_ERROR_BODY_CHARS: usize = 512;

const EMBED_COLOR: u32 = 0x00ff00;

/// Delivers a batch summary somewhere outside the process.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `batch`. Never called with an empty batch.
    ///
    /// # Errors
    ///
    /// Returns a delivery error if the batch could not be delivered.
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()>;
}

/// Posts batches to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
    description: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Creates a notifier for the webhook in `config`.
    #[must_use]
    pub fn new(config: &PollConfig) -> Self {
        Self::with_url(
            config.webhook_url.clone(),
            config.description.clone(),
            config.timeouts.notify,
        )
    }

    /// Creates a notifier for an explicit URL.
    #[must_use]
    pub fn with_url(url: Url, description: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            description: description.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(name = "notifier::deliver", skip_all, fields(batch_size = batch.len()))]
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        let payload = WebhookPayload::from_batch(batch, &self.description);

        let response = self
            .client
            .post(self.url.clone())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    Error::DeliveryTimeout {
                        timeout: self.timeout,
                    }
                } else {
                    Error::WebhookRequest { source }
                }
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            debug!(status = status.as_u16(), "Webhook accepted notification");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::WebhookStatus {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY_CHARS),
        })
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

impl WebhookPayload {
    fn from_batch(batch: &NotificationBatch, description: &str) -> Self {
        let messages = batch.messages();
        let title = format!("📫 New emails: {}", messages.len());
        let mut description =
            truncate(description, MAX_DESCRIPTION_CHARS - OVERFLOW_NOTE_CHARS);

        let mut budget = MAX_EMBED_CHARS
            .saturating_sub(title.chars().count())
            .saturating_sub(description.chars().count())
            .saturating_sub(OVERFLOW_NOTE_CHARS);

        let mut fields = Vec::new();
        for message in messages.iter().take(MAX_EMBED_FIELDS) {
            let field = EmbedField::from_message(message);
            let size = field.char_count();
            if size > budget {
                break;
            }
            budget -= size;
            fields.push(field);
        }

        let hidden = messages.len() - fields.len();
        if hidden > 0 {
            description.push_str(&format!("\n…and {hidden} more"));
        }

        Self {
            embeds: vec![Embed {
                title,
                description,
                color: EMBED_COLOR,
                fields,
            }],
        }
    }
}

impl EmbedField {
    fn from_message(message: &MailMessage) -> Self {
        let name = if message.subject.trim().is_empty() {
            "(no subject)".to_string()
        } else {
            truncate(&message.subject, MAX_FIELD_NAME_CHARS)
        };

        let value = format!(
            "**From:** {}\n**Date:** {}",
            message.sender_address.as_deref().unwrap_or("unknown"),
            message.received_at.format("%Y-%m-%d %H:%M:%S")
        );

        Self {
            name,
            value: truncate(&value, MAX_FIELD_VALUE_CHARS),
            inline: false,
        }
    }

    fn char_count(&self) -> usize {
        self.name.chars().count() + self.value.chars().count()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
