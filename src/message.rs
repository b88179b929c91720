//! Messages fetched during a poll cycle and the batch handed to the notifier.

use chrono::{DateTime, Utc};

/// A message as reported by the mail store at fetch time.
///
/// Owned by a single poll cycle and discarded when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Server UID within the selected mailbox.
    pub uid: u32,
    /// First `From` address, if the envelope carried one.
    pub sender_address: Option<String>,
    /// Decoded subject line (empty when absent).
    pub subject: String,
    /// When the server received the message.
    pub received_at: DateTime<Utc>,
    /// Whether the `\Seen` flag was set.
    pub is_seen: bool,
}

impl MailMessage {
    /// Returns the domain part of the sender address, if any.
    #[must_use]
    pub fn sender_domain(&self) -> Option<&str> {
        self.sender_address
            .as_deref()
            .and_then(|address| address.rsplit_once('@'))
            .map(|(_, domain)| domain)
    }
}

/// Messages that passed filtering in one cycle, delivered as a single notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationBatch {
    messages: Vec<MailMessage>,
}

impl NotificationBatch {
    /// Wraps filtered messages, preserving their order.
    #[must_use]
    pub fn new(messages: Vec<MailMessage>) -> Self {
        Self { messages }
    }

    /// Number of messages in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing qualified this cycle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The batched messages.
    #[must_use]
    pub fn messages(&self) -> &[MailMessage] {
        &self.messages
    }
}
